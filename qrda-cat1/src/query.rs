//! Path selectors over a [`Document`](crate::document::Document).
//!
//! The supported language is the subset of XPath 1.0 the QRDA templates need:
//! `/`, `//`, `.`, `..`, `*`, `@name`, `text()`, `node()`, namespace prefixes
//! (`cda`, `sdtc`, `xsi`), and predicates built from positions, existence
//! tests, `=`/`!=` against string literals, `and`, `or` and `not(...)`.
//! As in XPath, `//x[n]` picks the n-th `x` child of every parent, not the
//! n-th `x` in the whole subtree.
//! Selectors are compiled once and evaluated many times.

use crate::document::{NodeId, NodeRef, CDA_NS, SDTC_NS, XSI_NS};

/// A selector string that failed to compile.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid selector {selector:?} at offset {offset}: {message}")]
pub struct SelectorError {
    pub selector: String,
    pub offset: usize,
    pub message: String,
}

impl From<SelectorError> for qrda_core::ImportError {
    fn from(err: SelectorError) -> Self {
        qrda_core::ImportError::Selector(err.to_string())
    }
}

/// A compiled selector.
#[derive(Debug, Clone)]
pub struct Selector {
    source: String,
    path: Path,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            source,
            tokens,
            pos: 0,
        };
        let path = parser.parse_path()?;
        if let Some((_, offset)) = parser.tokens.get(parser.pos) {
            return Err(parser.error_at(*offset, "unexpected trailing input"));
        }
        Ok(Self {
            source: source.to_string(),
            path,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// All matching element or text nodes, in document order.
    pub fn find_all<'d>(&self, scope: NodeRef<'d>) -> Vec<NodeRef<'d>> {
        let document = scope.document();
        evaluate(&self.path, scope, Item::Node(scope.id()))
            .into_iter()
            .filter_map(|item| match item {
                Item::Node(id) => Some(document.node(id)),
                Item::Attribute(..) => None,
            })
            .collect()
    }

    /// Every match from each scope, concatenated in scope order.
    pub fn find_all_in<'d>(&self, scopes: &[NodeRef<'d>]) -> Vec<NodeRef<'d>> {
        scopes.iter().flat_map(|scope| self.find_all(*scope)).collect()
    }

    pub fn find_first<'d>(&self, scope: NodeRef<'d>) -> Option<NodeRef<'d>> {
        self.find_all(scope).into_iter().next()
    }

    /// Trimmed string value of the first match; empty values count as absent.
    pub fn value_of(&self, scope: NodeRef<'_>) -> Option<String> {
        self.values_of(scope).into_iter().next()
    }

    /// Trimmed, non-empty string values of every match.
    pub fn values_of(&self, scope: NodeRef<'_>) -> Vec<String> {
        evaluate(&self.path, scope, Item::Node(scope.id()))
            .into_iter()
            .map(|item| item.string_value(scope))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Item {
    Node(NodeId),
    Attribute(NodeId, usize),
}

impl Item {
    fn order_key(self) -> (NodeId, usize) {
        match self {
            Item::Node(id) => (id, 0),
            Item::Attribute(id, index) => (id, index + 1),
        }
    }

    fn string_value(self, anchor: NodeRef<'_>) -> String {
        let document = anchor.document();
        match self {
            Item::Node(id) => document.node(id).text(),
            Item::Attribute(id, index) => document
                .node(id)
                .attributes()
                .get(index)
                .map(|attr| attr.value.clone())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
struct Path {
    absolute: bool,
    steps: Vec<Step>,
}

#[derive(Debug, Clone)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
    SelfNode,
    Parent,
    Attribute,
}

#[derive(Debug, Clone)]
enum NodeTest {
    Name {
        namespace: Option<&'static str>,
        local: String,
    },
    AnyName,
    Text,
    AnyNode,
}

#[derive(Debug, Clone)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Position(usize),
    Exists(Path),
    Compare {
        path: Path,
        negate: bool,
        literal: String,
    },
}

fn evaluate(path: &Path, anchor: NodeRef<'_>, context: Item) -> Vec<Item> {
    let mut current = if path.absolute {
        vec![Item::Node(anchor.document().root().id())]
    } else {
        vec![context]
    };

    for step in &path.steps {
        let mut next = Vec::new();
        for item in &current {
            next.extend(apply_step(step, anchor, *item));
        }
        next.sort_by_key(|item| item.order_key());
        next.dedup();
        current = next;
        if current.is_empty() {
            break;
        }
    }

    current
}

fn apply_step(step: &Step, anchor: NodeRef<'_>, item: Item) -> Vec<Item> {
    let document = anchor.document();
    let Item::Node(id) = item else {
        return Vec::new();
    };
    let node = document.node(id);

    let candidates: Vec<Item> = match step.axis {
        Axis::Child => children_matching(step, node),
        // descendant-or-self::node()/child::test, one position group per parent
        Axis::Descendant => std::iter::once(node)
            .chain(node.descendants())
            .flat_map(|parent| filter_predicates(step, anchor, children_matching(step, parent)))
            .collect::<Vec<_>>(),
        Axis::SelfNode => {
            if node_matches(&step.test, node) {
                vec![item]
            } else {
                Vec::new()
            }
        }
        Axis::Parent => node
            .parent()
            .filter(|parent| node_matches(&step.test, *parent))
            .map(|parent| vec![Item::Node(parent.id())])
            .unwrap_or_default(),
        Axis::Attribute => node
            .attributes()
            .iter()
            .enumerate()
            .filter(|(_, attr)| match &step.test {
                NodeTest::Name { namespace, local } => {
                    attr.name == *local && attr.namespace.as_deref() == *namespace
                }
                NodeTest::AnyName | NodeTest::AnyNode => true,
                NodeTest::Text => false,
            })
            .map(|(index, _)| Item::Attribute(id, index))
            .collect(),
    };

    match step.axis {
        Axis::Descendant => candidates,
        _ => filter_predicates(step, anchor, candidates),
    }
}

fn children_matching(step: &Step, parent: NodeRef<'_>) -> Vec<Item> {
    parent
        .children()
        .filter(|child| node_matches(&step.test, *child))
        .map(|child| Item::Node(child.id()))
        .collect()
}

fn filter_predicates(step: &Step, anchor: NodeRef<'_>, candidates: Vec<Item>) -> Vec<Item> {
    step.predicates.iter().fold(candidates, |items, predicate| {
        items
            .iter()
            .enumerate()
            .filter(|(index, candidate)| eval_expr(predicate, anchor, **candidate, index + 1))
            .map(|(_, candidate)| *candidate)
            .collect()
    })
}

fn node_matches(test: &NodeTest, node: NodeRef<'_>) -> bool {
    match test {
        NodeTest::AnyNode => true,
        NodeTest::Text => node.is_text(),
        NodeTest::AnyName => node.is_element(),
        NodeTest::Name { namespace, local } => {
            node.local_name() == Some(local.as_str()) && node.namespace() == *namespace
        }
    }
}

fn eval_expr(expr: &Expr, anchor: NodeRef<'_>, item: Item, position: usize) -> bool {
    match expr {
        Expr::Or(left, right) => {
            eval_expr(left, anchor, item, position) || eval_expr(right, anchor, item, position)
        }
        Expr::And(left, right) => {
            eval_expr(left, anchor, item, position) && eval_expr(right, anchor, item, position)
        }
        Expr::Not(inner) => !eval_expr(inner, anchor, item, position),
        Expr::Position(expected) => position == *expected,
        Expr::Exists(path) => !evaluate(path, anchor, item).is_empty(),
        Expr::Compare {
            path,
            negate,
            literal,
        } => evaluate(path, anchor, item)
            .into_iter()
            .any(|found| (found.string_value(anchor) == *literal) != *negate),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    Dot,
    DotDot,
    At,
    Star,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Eq,
    NotEq,
    Name(String),
    Literal(String),
    Number(usize),
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, SelectorError> {
    let error = |offset: usize, message: &str| SelectorError {
        selector: source.to_string(),
        offset,
        message: message.to_string(),
    };

    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];
        let peek = chars.get(i + 1).map(|(_, c)| *c);
        match c {
            c if c.is_whitespace() => {
                i += 1;
            }
            '/' if peek == Some('/') => {
                tokens.push((Token::DoubleSlash, offset));
                i += 2;
            }
            '/' => {
                tokens.push((Token::Slash, offset));
                i += 1;
            }
            '.' if peek == Some('.') => {
                tokens.push((Token::DotDot, offset));
                i += 2;
            }
            '.' => {
                tokens.push((Token::Dot, offset));
                i += 1;
            }
            '@' => {
                tokens.push((Token::At, offset));
                i += 1;
            }
            '*' => {
                tokens.push((Token::Star, offset));
                i += 1;
            }
            '[' => {
                tokens.push((Token::LBracket, offset));
                i += 1;
            }
            ']' => {
                tokens.push((Token::RBracket, offset));
                i += 1;
            }
            '(' => {
                tokens.push((Token::LParen, offset));
                i += 1;
            }
            ')' => {
                tokens.push((Token::RParen, offset));
                i += 1;
            }
            '=' => {
                tokens.push((Token::Eq, offset));
                i += 1;
            }
            '!' if peek == Some('=') => {
                tokens.push((Token::NotEq, offset));
                i += 2;
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end].1 != quote {
                    end += 1;
                }
                if end >= chars.len() {
                    return Err(error(offset, "unterminated string literal"));
                }
                let literal: String = chars[start..end].iter().map(|(_, c)| *c).collect();
                tokens.push((Token::Literal(literal), offset));
                i = end + 1;
            }
            c if c.is_ascii_digit() => {
                let mut end = i;
                while end < chars.len() && chars[end].1.is_ascii_digit() {
                    end += 1;
                }
                let digits: String = chars[i..end].iter().map(|(_, c)| *c).collect();
                let number = digits
                    .parse::<usize>()
                    .map_err(|_| error(offset, "position out of range"))?;
                tokens.push((Token::Number(number), offset));
                i = end;
            }
            c if is_name_start(c) => {
                let mut end = i;
                while end < chars.len() && is_name_char(chars[end].1) {
                    end += 1;
                }
                // `prefix:local`
                if end + 1 < chars.len() && chars[end].1 == ':' && is_name_start(chars[end + 1].1)
                {
                    end += 1;
                    while end < chars.len() && is_name_char(chars[end].1) {
                        end += 1;
                    }
                }
                let name: String = chars[i..end].iter().map(|(_, c)| *c).collect();
                tokens.push((Token::Name(name), offset));
                i = end;
            }
            _ => return Err(error(offset, &format!("unexpected character {c:?}"))),
        }
    }

    Ok(tokens)
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.'
}

struct Parser<'s> {
    source: &'s str,
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser<'_> {
    fn error_at(&self, offset: usize, message: &str) -> SelectorError {
        SelectorError {
            selector: self.source.to_string(),
            offset,
            message: message.to_string(),
        }
    }

    fn error(&self, message: &str) -> SelectorError {
        let offset = self
            .tokens
            .get(self.pos)
            .map(|(_, offset)| *offset)
            .unwrap_or(self.source.len());
        self.error_at(offset, message)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|(token, _)| token)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(token, _)| token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), SelectorError> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected {what}")))
        }
    }

    fn parse_path(&mut self) -> Result<Path, SelectorError> {
        let mut steps = Vec::new();
        let absolute = match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                steps.push(self.parse_step(Axis::Child)?);
                true
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                steps.push(self.parse_step(Axis::Descendant)?);
                true
            }
            _ => {
                steps.push(self.parse_step(Axis::Child)?);
                false
            }
        };

        loop {
            match self.peek() {
                Some(Token::Slash) => {
                    self.pos += 1;
                    steps.push(self.parse_step(Axis::Child)?);
                }
                Some(Token::DoubleSlash) => {
                    self.pos += 1;
                    steps.push(self.parse_step(Axis::Descendant)?);
                }
                _ => break,
            }
        }

        Ok(Path { absolute, steps })
    }

    fn parse_step(&mut self, axis: Axis) -> Result<Step, SelectorError> {
        let (axis, test) = match self.advance() {
            Some(Token::Dot) if axis == Axis::Child => (Axis::SelfNode, NodeTest::AnyNode),
            Some(Token::DotDot) if axis == Axis::Child => (Axis::Parent, NodeTest::AnyNode),
            Some(Token::At) if axis == Axis::Child => {
                let test = match self.advance() {
                    Some(Token::Star) => NodeTest::AnyName,
                    Some(Token::Name(name)) => self.name_test(&name)?,
                    _ => return Err(self.error("expected attribute name")),
                };
                (Axis::Attribute, test)
            }
            Some(Token::Star) => (axis, NodeTest::AnyName),
            Some(Token::Name(name))
                if (name == "text" || name == "node") && self.peek() == Some(&Token::LParen) =>
            {
                self.pos += 1;
                self.expect(Token::RParen, "`)`")?;
                let test = if name == "text" {
                    NodeTest::Text
                } else {
                    NodeTest::AnyNode
                };
                (axis, test)
            }
            Some(Token::Name(name)) => (axis, self.name_test(&name)?),
            Some(_) => {
                self.pos -= 1;
                return Err(self.error("expected a step"));
            }
            None => return Err(self.error("expected a step")),
        };

        let mut predicates = Vec::new();
        while self.peek() == Some(&Token::LBracket) {
            self.pos += 1;
            predicates.push(self.parse_or()?);
            self.expect(Token::RBracket, "`]`")?;
        }

        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn name_test(&self, name: &str) -> Result<NodeTest, SelectorError> {
        let Some((prefix, local)) = name.split_once(':') else {
            return Ok(NodeTest::Name {
                namespace: None,
                local: name.to_string(),
            });
        };
        let namespace = match prefix {
            "cda" => CDA_NS,
            "sdtc" => SDTC_NS,
            "xsi" => XSI_NS,
            other => return Err(self.error(&format!("unknown namespace prefix `{other}`"))),
        };
        Ok(NodeTest::Name {
            namespace: Some(namespace),
            local: local.to_string(),
        })
    }

    fn keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Name(name)) if name == word)
    }

    fn parse_or(&mut self) -> Result<Expr, SelectorError> {
        let mut left = self.parse_and()?;
        while self.keyword("or") {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, SelectorError> {
        let mut left = self.parse_unary()?;
        while self.keyword("and") {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, SelectorError> {
        if self.keyword("not") && self.peek_at(1) == Some(&Token::LParen) {
            self.pos += 2;
            let inner = self.parse_or()?;
            self.expect(Token::RParen, "`)`")?;
            return Ok(Expr::Not(Box::new(inner)));
        }

        match self.peek() {
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.parse_or()?;
                self.expect(Token::RParen, "`)`")?;
                Ok(inner)
            }
            Some(Token::Number(number)) => {
                let number = *number;
                self.pos += 1;
                if number == 0 {
                    return Err(self.error("positions start at 1"));
                }
                Ok(Expr::Position(number))
            }
            _ => {
                let path = self.parse_path()?;
                let negate = match self.peek() {
                    Some(Token::Eq) => false,
                    Some(Token::NotEq) => true,
                    _ => return Ok(Expr::Exists(path)),
                };
                self.pos += 1;
                match self.advance() {
                    Some(Token::Literal(literal)) => Ok(Expr::Compare {
                        path,
                        negate,
                        literal,
                    }),
                    _ => {
                        self.pos = self.pos.saturating_sub(1);
                        Err(self.error("expected a string literal"))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    const DOC: &str = r#"<ClinicalDocument xmlns="urn:hl7-org:v3" xmlns:sdtc="urn:hl7-org:sdtc">
  <templateId root="2.16.840.1.113883.10.20.24.1.2" extension="2021-08-01"/>
  <component>
    <section>
      <templateId root="2.16.840.1.113883.10.20.24.2.1"/>
      <entry>
        <observation>
          <templateId root="A"/>
          <id root="1.1" extension="first"/>
          <participant typeCode="PRF"><participantRole><id root="p1"/></participantRole></participant>
        </observation>
      </entry>
      <entry>
        <act>
          <templateId root="B"/>
          <entryRelationship>
            <observation><templateId root="A"/><id root="1.1" extension="nested"/></observation>
          </entryRelationship>
        </act>
      </entry>
      <entry>
        <observation><templateId root="C"/><value>  42 </value></observation>
      </entry>
    </section>
  </component>
</ClinicalDocument>"#;

    fn section(document: &Document) -> NodeRef<'_> {
        Selector::parse("/cda:ClinicalDocument/cda:component/cda:section")
            .expect("selector")
            .find_first(document.root())
            .expect("section")
    }

    #[test]
    fn child_steps_with_template_predicate() {
        let document = Document::parse(DOC).expect("doc");
        let scope = section(&document);
        let selector =
            Selector::parse("./cda:entry/cda:observation[cda:templateId/@root = 'A']").expect("selector");
        let found = selector.find_all(scope);
        assert_eq!(found.len(), 1);
        assert_eq!(
            selector.as_str(),
            "./cda:entry/cda:observation[cda:templateId/@root = 'A']"
        );

        let id = Selector::parse("./cda:id/@extension").expect("selector");
        assert_eq!(id.value_of(found[0]).as_deref(), Some("first"));
    }

    #[test]
    fn descendant_axis_reaches_nested_templates_in_document_order() {
        let document = Document::parse(DOC).expect("doc");
        let scope = section(&document);
        let selector = Selector::parse(".//cda:observation[cda:templateId/@root='A']/cda:id/@extension")
            .expect("selector");
        assert_eq!(selector.values_of(scope), vec!["first", "nested"]);
    }

    #[test]
    fn boolean_predicates_and_attribute_tests() {
        let document = Document::parse(DOC).expect("doc");
        let present = Selector::parse(
            "/cda:ClinicalDocument/cda:templateId[@root=\"2.16.840.1.113883.10.20.24.1.2\" and @extension=\"2021-08-01\"]",
        )
        .expect("selector");
        assert!(present.find_first(document.root()).is_some());

        let absent = Selector::parse(
            "/cda:ClinicalDocument/cda:templateId[@root='2.16.840.1.113883.10.20.24.1.2' and not(@extension)]",
        )
        .expect("selector");
        assert!(absent.find_first(document.root()).is_none());

        let either = Selector::parse("//cda:templateId[@root='B' or @root='C']").expect("selector");
        assert_eq!(either.find_all(document.root()).len(), 2);

        let prf = Selector::parse("//cda:participant[@typeCode != 'AUT']").expect("selector");
        assert_eq!(prf.find_all(document.root()).len(), 1);
    }

    #[test]
    fn positions_parents_and_text() {
        let document = Document::parse(DOC).expect("doc");
        let scope = section(&document);
        let second = Selector::parse("./cda:entry[2]/cda:act/cda:templateId/@root").expect("selector");
        assert_eq!(second.value_of(scope).as_deref(), Some("B"));

        let value = Selector::parse("./cda:entry/cda:observation/cda:value/text()").expect("selector");
        assert_eq!(value.value_of(scope).as_deref(), Some("42"));

        let parent = Selector::parse("./cda:entry/cda:observation/cda:value/../cda:templateId/@root")
            .expect("selector");
        assert_eq!(parent.value_of(scope).as_deref(), Some("C"));
    }

    #[test]
    fn descendant_positions_count_per_parent() {
        let document = Document::parse(DOC).expect("doc");
        let scope = section(&document);
        let first = Selector::parse(".//cda:observation[1]/cda:id/@extension").expect("selector");
        assert_eq!(first.values_of(scope), vec!["first", "nested"]);

        let second = Selector::parse(".//cda:observation[2]").expect("selector");
        assert!(second.find_all(scope).is_empty());
    }

    #[test]
    fn malformed_selectors_are_rejected() {
        for bad in [
            "./cda:entry[",
            "./foo:entry",
            "./cda:entry[@root = ]",
            "./cda:entry[0]",
            "./cda:entry/",
            "./cda:entry[@root='x]",
        ] {
            assert!(Selector::parse(bad).is_err(), "{bad} should be rejected");
        }
    }
}
