use std::fmt;
use std::ops::RangeInclusive;

/// A name pattern of a selection leaf. A trailing `*` matches any suffix;
/// comparison ignores ASCII case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePattern(String);

impl NamePattern {
    pub fn new(pattern: &str) -> Self {
        Self(pattern.to_ascii_uppercase())
    }

    pub fn matches(&self, name: &str) -> bool {
        let name = name.trim();
        match self.0.strip_suffix('*') {
            Some(prefix) => name
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix)),
            None => name.eq_ignore_ascii_case(&self.0),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Parsed atom selection expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    All,
    None,
    Atom(Vec<NamePattern>),
    AtomNo(Vec<RangeInclusive<i64>>),
    Residue(Vec<NamePattern>),
    ResidueNo(Vec<RangeInclusive<i64>>),
    Chain(Vec<char>),
    Element(Vec<NamePattern>),
    Backbone,
    Protein,
    Dna,
    Water,
    Sidechain,
    And(Box<Selection>, Box<Selection>),
    Or(Box<Selection>, Box<Selection>),
    Not(Box<Selection>),
    /// Atoms lying within `radius` Å of any atom matched by `inner`.
    Within { radius: f64, inner: Box<Selection> },
    /// Atoms farther than `radius` Å from every atom matched by `inner`.
    NotWithin { radius: f64, inner: Box<Selection> },
}

/// One method per node kind. Combinators receive their children unevaluated
/// so that implementations decide traversal order themselves.
pub trait SelectionVisitor {
    type Output;

    fn visit_all(&mut self) -> Self::Output;
    fn visit_none(&mut self) -> Self::Output;
    fn visit_atom(&mut self, names: &[NamePattern]) -> Self::Output;
    fn visit_atom_no(&mut self, ranges: &[RangeInclusive<i64>]) -> Self::Output;
    fn visit_residue(&mut self, names: &[NamePattern]) -> Self::Output;
    fn visit_residue_no(&mut self, ranges: &[RangeInclusive<i64>]) -> Self::Output;
    fn visit_chain(&mut self, chains: &[char]) -> Self::Output;
    fn visit_element(&mut self, elements: &[NamePattern]) -> Self::Output;
    fn visit_backbone(&mut self) -> Self::Output;
    fn visit_protein(&mut self) -> Self::Output;
    fn visit_dna(&mut self) -> Self::Output;
    fn visit_water(&mut self) -> Self::Output;
    fn visit_sidechain(&mut self) -> Self::Output;
    fn visit_and(&mut self, lhs: &Selection, rhs: &Selection) -> Self::Output;
    fn visit_or(&mut self, lhs: &Selection, rhs: &Selection) -> Self::Output;
    fn visit_not(&mut self, inner: &Selection) -> Self::Output;
    fn visit_within(&mut self, radius: f64, inner: &Selection) -> Self::Output;
    fn visit_not_within(&mut self, radius: f64, inner: &Selection) -> Self::Output;
}

impl Selection {
    pub fn accept<V: SelectionVisitor>(&self, visitor: &mut V) -> V::Output {
        match self {
            Selection::All => visitor.visit_all(),
            Selection::None => visitor.visit_none(),
            Selection::Atom(names) => visitor.visit_atom(names),
            Selection::AtomNo(ranges) => visitor.visit_atom_no(ranges),
            Selection::Residue(names) => visitor.visit_residue(names),
            Selection::ResidueNo(ranges) => visitor.visit_residue_no(ranges),
            Selection::Chain(chains) => visitor.visit_chain(chains),
            Selection::Element(elements) => visitor.visit_element(elements),
            Selection::Backbone => visitor.visit_backbone(),
            Selection::Protein => visitor.visit_protein(),
            Selection::Dna => visitor.visit_dna(),
            Selection::Water => visitor.visit_water(),
            Selection::Sidechain => visitor.visit_sidechain(),
            Selection::And(lhs, rhs) => visitor.visit_and(lhs, rhs),
            Selection::Or(lhs, rhs) => visitor.visit_or(lhs, rhs),
            Selection::Not(inner) => visitor.visit_not(inner),
            Selection::Within { radius, inner } => visitor.visit_within(*radius, inner),
            Selection::NotWithin { radius, inner } => visitor.visit_not_within(*radius, inner),
        }
    }

    /// Whether evaluating this selection needs coordinates, not just the atom
    /// table.
    pub fn is_spatial(&self) -> bool {
        match self {
            Selection::Within { .. } | Selection::NotWithin { .. } => true,
            Selection::And(l, r) | Selection::Or(l, r) => l.is_spatial() || r.is_spatial(),
            Selection::Not(inner) => inner.is_spatial(),
            _ => false,
        }
    }
}

/// Renders a selection back into canonical, fully parenthesized source.
struct Printer<'a, 'b> {
    f: &'a mut fmt::Formatter<'b>,
}

impl Printer<'_, '_> {
    fn list<T>(&mut self, keyword: &str, items: &[T], each: impl Fn(&T) -> String) -> fmt::Result {
        let items: Vec<String> = items.iter().map(each).collect();
        write!(self.f, "{} {}", keyword, items.join(", "))
    }

    fn range(r: &RangeInclusive<i64>) -> String {
        if r.start() == r.end() {
            r.start().to_string()
        } else {
            format!("{}-{}", r.start(), r.end())
        }
    }

    fn binary(&mut self, op: &str, lhs: &Selection, rhs: &Selection) -> fmt::Result {
        write!(self.f, "(")?;
        lhs.accept(self)?;
        write!(self.f, " {} ", op)?;
        rhs.accept(self)?;
        write!(self.f, ")")
    }

    fn spatial(&mut self, keyword: &str, radius: f64, inner: &Selection) -> fmt::Result {
        write!(self.f, "{}({}, ", keyword, radius)?;
        inner.accept(self)?;
        write!(self.f, ")")
    }
}

impl SelectionVisitor for Printer<'_, '_> {
    type Output = fmt::Result;

    fn visit_all(&mut self) -> fmt::Result {
        self.f.write_str("all")
    }
    fn visit_none(&mut self) -> fmt::Result {
        self.f.write_str("none")
    }
    fn visit_atom(&mut self, names: &[NamePattern]) -> fmt::Result {
        self.list("atom", names, |n| n.as_str().to_string())
    }
    fn visit_atom_no(&mut self, ranges: &[RangeInclusive<i64>]) -> fmt::Result {
        self.list("atomno", ranges, Self::range)
    }
    fn visit_residue(&mut self, names: &[NamePattern]) -> fmt::Result {
        self.list("residue", names, |n| n.as_str().to_string())
    }
    fn visit_residue_no(&mut self, ranges: &[RangeInclusive<i64>]) -> fmt::Result {
        self.list("resno", ranges, Self::range)
    }
    fn visit_chain(&mut self, chains: &[char]) -> fmt::Result {
        self.list("chain", chains, |c| c.to_string())
    }
    fn visit_element(&mut self, elements: &[NamePattern]) -> fmt::Result {
        self.list("element", elements, |n| n.as_str().to_string())
    }
    fn visit_backbone(&mut self) -> fmt::Result {
        self.f.write_str("backbone")
    }
    fn visit_protein(&mut self) -> fmt::Result {
        self.f.write_str("protein")
    }
    fn visit_dna(&mut self) -> fmt::Result {
        self.f.write_str("dna")
    }
    fn visit_water(&mut self) -> fmt::Result {
        self.f.write_str("water")
    }
    fn visit_sidechain(&mut self) -> fmt::Result {
        self.f.write_str("sidechain")
    }
    fn visit_and(&mut self, lhs: &Selection, rhs: &Selection) -> fmt::Result {
        self.binary("and", lhs, rhs)
    }
    fn visit_or(&mut self, lhs: &Selection, rhs: &Selection) -> fmt::Result {
        self.binary("or", lhs, rhs)
    }
    fn visit_not(&mut self, inner: &Selection) -> fmt::Result {
        write!(self.f, "not ")?;
        inner.accept(self)
    }
    fn visit_within(&mut self, radius: f64, inner: &Selection) -> fmt::Result {
        self.spatial("within", radius, inner)
    }
    fn visit_not_within(&mut self, radius: f64, inner: &Selection) -> fmt::Result {
        self.spatial("notwithin", radius, inner)
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.accept(&mut Printer { f })
    }
}
