//! Glyph catalogue and the elemental resonance table.
//!
//! Every combinable symbol may carry an [`Element`]. Pairs of elements
//! resonate according to a fixed symmetric table; any pair involving a
//! symbol without an element falls back to [`UNKNOWN_RESONANCE`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The five base glyphs of the drift field.
pub const BASE_GLYPHS: [&str; 5] = ["▲", "⊗", "≈", "∇", "∆"];

/// Result glyphs handed out to newly discovered combinations.
pub const HYBRID_GLYPHS: [&str; 10] = ["⟡", "⟢", "⟣", "⟤", "⟥", "⧆", "⧇", "⧈", "⧉", "⧊"];

/// Sentinel glyph carried by failed combinations.
pub const FAILURE_GLYPH: &str = "✗";

/// Resonance assumed for any pair with an unassigned symbol.
pub const UNKNOWN_RESONANCE: f64 = 0.5;

/// Words used when naming a discovery with no known element.
const UNKNOWN_WORDS: [&str; 3] = ["Mystery", "Enigma", "Unknown"];

/// Elemental category of a glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    Void,
    Energy,
    Flow,
    Stability,
    Change,
}

impl Element {
    /// All elements, in table order.
    pub const ALL: [Element; 5] = [
        Element::Void,
        Element::Energy,
        Element::Flow,
        Element::Stability,
        Element::Change,
    ];

    /// Returns the element name.
    pub fn name(&self) -> &'static str {
        match self {
            Element::Void => "void",
            Element::Energy => "energy",
            Element::Flow => "flow",
            Element::Stability => "stability",
            Element::Change => "change",
        }
    }

    /// Symmetric resonance between two elements. Identical elements resonate
    /// perfectly.
    pub fn resonance(self, other: Element) -> f64 {
        use Element::*;

        if self == other {
            return 1.0;
        }
        let (a, b) = if self < other { (self, other) } else { (other, self) };
        match (a, b) {
            (Void, Energy) => 0.8,
            (Void, Flow) => 0.3,
            (Void, Stability) => 0.1,
            (Void, Change) => 0.9,
            (Energy, Flow) => 0.7,
            (Energy, Stability) => 0.2,
            (Energy, Change) => 0.8,
            (Flow, Stability) => 0.4,
            (Flow, Change) => 0.6,
            (Stability, Change) => 0.1,
            _ => UNKNOWN_RESONANCE,
        }
    }

    /// Name fragments for synthesized combinations.
    pub fn name_words(&self) -> &'static [&'static str] {
        match self {
            Element::Void => &["Void", "Shadow", "Null"],
            Element::Energy => &["Lightning", "Flux", "Surge"],
            Element::Flow => &["Stream", "Current", "Wave"],
            Element::Stability => &["Crystal", "Anchor", "Foundation"],
            Element::Change => &["Shift", "Mutation", "Evolution"],
        }
    }

    /// Property tags a discovery may inherit from this element.
    pub fn property_pool(&self) -> &'static [&'static str] {
        match self {
            Element::Void => &["nullification", "absorption", "emptiness"],
            Element::Energy => &["amplification", "acceleration", "intensity"],
            Element::Flow => &["fluidity", "adaptation", "continuity"],
            Element::Stability => &["preservation", "structure", "endurance"],
            Element::Change => &["transformation", "evolution", "chaos"],
        }
    }
}

impl std::fmt::Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Name fragments for an optional element.
pub fn name_words_for(element: Option<Element>) -> &'static [&'static str] {
    match element {
        Some(e) => e.name_words(),
        None => &UNKNOWN_WORDS,
    }
}

/// Maps symbols to their elemental category.
#[derive(Debug, Clone, Default)]
pub struct ElementalTable {
    affinities: HashMap<String, Element>,
}

impl ElementalTable {
    /// Creates a table with no assignments (every pair resonates at 0.5).
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard table over [`BASE_GLYPHS`].
    pub fn standard() -> Self {
        let mut table = Self::new();
        for (glyph, element) in BASE_GLYPHS.iter().zip(Element::ALL) {
            table.assign(*glyph, element);
        }
        table
    }

    /// Builder-style assignment.
    pub fn with_affinity(mut self, symbol: impl Into<String>, element: Element) -> Self {
        self.assign(symbol, element);
        self
    }

    /// Assigns (or reassigns) the element of a symbol.
    pub fn assign(&mut self, symbol: impl Into<String>, element: Element) {
        self.affinities.insert(symbol.into(), element);
    }

    /// Returns the element of a symbol, if assigned.
    pub fn element_of(&self, symbol: &str) -> Option<Element> {
        self.affinities.get(symbol).copied()
    }

    /// Distinct elements present in the table, sorted.
    pub fn elements(&self) -> Vec<Element> {
        let mut elements: Vec<Element> = self.affinities.values().copied().collect();
        elements.sort();
        elements.dedup();
        elements
    }

    /// Resonance between two symbols.
    pub fn pair_resonance(&self, a: &str, b: &str) -> f64 {
        match (self.element_of(a), self.element_of(b)) {
            (Some(x), Some(y)) => x.resonance(y),
            _ => UNKNOWN_RESONANCE,
        }
    }

    /// Average resonance over every unordered pair of distinct positions.
    ///
    /// Returns 0.0 for fewer than two tokens.
    pub fn average_resonance<S: AsRef<str>>(&self, tokens: &[S]) -> f64 {
        let mut total = 0.0;
        let mut pairs = 0usize;

        for i in 0..tokens.len() {
            for j in (i + 1)..tokens.len() {
                total += self.pair_resonance(tokens[i].as_ref(), tokens[j].as_ref());
                pairs += 1;
            }
        }

        if pairs == 0 {
            0.0
        } else {
            total / pairs as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_resonance_is_symmetric() {
        for a in Element::ALL {
            for b in Element::ALL {
                assert_eq!(a.resonance(b), b.resonance(a));
            }
        }
        assert_eq!(Element::Void.resonance(Element::Void), 1.0);
        assert_eq!(Element::Void.resonance(Element::Change), 0.9);
    }

    #[test]
    fn test_standard_table_assignments() {
        let table = ElementalTable::standard();
        assert_eq!(table.element_of("▲"), Some(Element::Void));
        assert_eq!(table.element_of("∆"), Some(Element::Change));
        assert_eq!(table.element_of("Ψ"), None);
        assert_eq!(table.elements().len(), 5);
    }

    #[test]
    fn test_unknown_pairs_default() {
        let table = ElementalTable::standard();
        assert_eq!(table.pair_resonance("▲", "Ψ"), UNKNOWN_RESONANCE);
        assert_eq!(table.pair_resonance("Ψ", "Ω"), UNKNOWN_RESONANCE);
    }

    #[test]
    fn test_average_resonance() {
        let table = ElementalTable::standard();

        // void-energy 0.8, void-flow 0.3, energy-flow 0.7
        assert_relative_eq!(table.average_resonance(&["▲", "⊗", "≈"]), 0.6, epsilon = 1e-12);

        // duplicated symbols are distinct positions and resonate fully
        assert_relative_eq!(table.average_resonance(&["▲", "▲"]), 1.0);
        assert_eq!(table.average_resonance(&["▲"]), 0.0);
    }
}
