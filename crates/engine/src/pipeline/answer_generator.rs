//! Natural-language answer rendering
//!
//! Phrasing is chosen from fixed rule tables keyed on attribute / relation
//! names. Rules are evaluated in table order.

use super::{CandidateAnswer, EntityIndex};
use kbqa_common::errors::Result;
use kbqa_common::models::GraphNode;
use std::collections::HashSet;

/// Attribute holding the airline code served by a counter
const AIRLINE_CODE_ATTRIBUTE: &str = "航司代码";

/// Predicate over an attribute or relation name
#[derive(Debug, Clone, Copy)]
enum NameMatch {
    /// Name contains any of the fragments
    Contains(&'static [&'static str]),
    /// Name is exactly this
    Equals(&'static str),
    /// Name is one of these
    OneOf(&'static [&'static str]),
}

impl NameMatch {
    fn matches(&self, name: &str) -> bool {
        match self {
            NameMatch::Contains(fragments) => fragments.iter().any(|f| name.contains(f)),
            NameMatch::Equals(expected) => name == *expected,
            NameMatch::OneOf(names) => names.iter().any(|n| *n == name),
        }
    }
}

/// Enumeration clauses; every matching rule contributes a clause
const ENUMERATION_CLAUSES: &[(NameMatch, &str)] = &[
    (NameMatch::Contains(&["时间"]), "营业时间是"),
    (NameMatch::Equals("地点"), "位置在"),
    (NameMatch::Contains(&["价格", "收费"]), "价格为"),
    (NameMatch::Contains(&["电话", "联系"]), "电话是"),
];

type RelationTemplate = fn(&str, &str, &str) -> String;

fn location_template(name: &str, _relation: &str, value: &str) -> String {
    format!("您好，{}在{}", name, value)
}

fn hours_template(name: &str, _relation: &str, value: &str) -> String {
    format!("您好，{}的服务时间是{}", name, value)
}

fn contact_template(name: &str, _relation: &str, value: &str) -> String {
    format!("您好，{}的客服电话是{}", name, value)
}

fn fee_template(name: &str, _relation: &str, value: &str) -> String {
    format!("您好，{}的收费标准是{}", name, value)
}

/// Single-relation phrasings; the first rule with any matching predicate wins
const RELATION_RULES: &[(&[NameMatch], RelationTemplate)] = &[
    (&[NameMatch::Contains(&["地点"])], location_template),
    (&[NameMatch::Contains(&["时间"])], hours_template),
    (&[NameMatch::OneOf(&["客服电话", "联系电话", "联系方式"])], contact_template),
    (
        &[NameMatch::Equals("手续费"), NameMatch::Contains(&["价格", "收费"])],
        fee_template,
    ),
];

fn generic_relation(name: &str, relation: &str, value: &str) -> String {
    format!("您好，{}的{}是{}", name, relation, value)
}

fn airline_clause(node: &GraphNode) -> String {
    node.attribute(AIRLINE_CODE_ATTRIBUTE)
        .map(|code| format!("，办理{}航司业务", code))
        .unwrap_or_default()
}

/// Render one candidate against its backing node
pub fn render_answer(candidate: &CandidateAnswer, node: &GraphNode) -> String {
    let name = node.name.as_str();

    let mut answer = match (&candidate.rel_score, &candidate.rel_name) {
        (Some(_), Some(relation)) => {
            let value = candidate.rel_val.as_deref().unwrap_or_default();
            RELATION_RULES
                .iter()
                .find(|(predicates, _)| predicates.iter().any(|p| p.matches(relation)))
                .map(|(_, template)| template(name, relation, value))
                .unwrap_or_else(|| generic_relation(name, relation, value))
        }
        _ => {
            let mut clauses = vec![format!("您好，机场内有{}", name)];
            for (attribute, value) in &node.attributes {
                clauses.extend(
                    ENUMERATION_CLAUSES
                        .iter()
                        .filter(|(rule, _)| rule.matches(attribute))
                        .map(|(_, prefix)| format!("{}{}", prefix, value)),
                );
            }
            clauses.join("，")
        }
    };

    answer.push_str(&airline_clause(node));
    answer
}

/// Renders ranked candidates and drops repeated sentences
#[derive(Debug, Clone, Copy, Default)]
pub struct AnswerGenerator;

impl AnswerGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Keeps rank order; a candidate whose sentence was already produced is dropped
    pub fn generate(&self, ranked: Vec<CandidateAnswer>, index: &EntityIndex) -> Result<Vec<CandidateAnswer>> {
        let mut seen = HashSet::new();
        let mut answers = Vec::with_capacity(ranked.len());

        for mut candidate in ranked {
            let linked = index.resolve(candidate.id)?;
            let text = render_answer(&candidate, &linked.entity);
            if seen.insert(text.clone()) {
                candidate.natural_ans = Some(text);
                answers.push(candidate);
            }
        }

        Ok(answers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{LinkedEntity, RelationCandidate};
    use kbqa_common::models::NodeLabel;

    fn relation_answer(node: &GraphNode, relation: &str) -> String {
        let linked = LinkedEntity::new(node.clone(), "", 0.9, "rule");
        let relation = RelationCandidate::from_attribute(&linked, relation, 0.9, "match").unwrap();
        render_answer(&CandidateAnswer::from_relation(relation), node)
    }

    fn counter() -> GraphNode {
        GraphNode::new(1, "东航值机柜台", NodeLabel::Instance)
            .with_attribute("地点", "F3 出发层")
            .with_attribute("营业时间", "06:00-22:00")
            .with_attribute("联系电话", "0871-96566")
            .with_attribute("手续费", "免费")
            .with_attribute("行李限额", "20kg")
            .with_attribute("航司代码", "MU")
    }

    #[test]
    fn test_relation_templates_in_priority_order() {
        let node = counter();

        assert_eq!(relation_answer(&node, "地点"), "您好，东航值机柜台在F3 出发层，办理MU航司业务");
        assert_eq!(
            relation_answer(&node, "营业时间"),
            "您好，东航值机柜台的服务时间是06:00-22:00，办理MU航司业务"
        );
        assert_eq!(
            relation_answer(&node, "联系电话"),
            "您好，东航值机柜台的客服电话是0871-96566，办理MU航司业务"
        );
        assert_eq!(relation_answer(&node, "手续费"), "您好，东航值机柜台的收费标准是免费，办理MU航司业务");
        assert_eq!(relation_answer(&node, "行李限额"), "您好，东航值机柜台的行李限额是20kg，办理MU航司业务");
    }

    #[test]
    fn test_enumeration_lists_matching_attributes_in_key_order() {
        let node = GraphNode::new(2, "停车场", NodeLabel::Instance)
            .with_attribute("地点", "P1")
            .with_attribute("收费", "5元/小时")
            .with_attribute("车位数", "3000")
            .with_attribute("营业时间", "全天");
        let linked = LinkedEntity::new(node.clone(), "停车场", 1.0, "rule");

        let text = render_answer(&CandidateAnswer::from_linked(&linked), &node);

        // BTreeMap order: 地点 < 收费 < 营业时间 < 车位数
        assert_eq!(text, "您好，机场内有停车场，位置在P1，价格为5元/小时，营业时间是全天");
    }

    #[test]
    fn test_enumeration_clauses_are_not_exclusive() {
        let node = GraphNode::new(3, "问询处", NodeLabel::Instance).with_attribute("联系时间", "全天");
        let linked = LinkedEntity::new(node.clone(), "", 1.0, "rule");

        let text = render_answer(&CandidateAnswer::from_linked(&linked), &node);
        assert_eq!(text, "您好，机场内有问询处，营业时间是全天，电话是全天");
    }

    #[test]
    fn test_generate_drops_repeated_sentences() {
        let node = GraphNode::new(4, "书吧", NodeLabel::Instance).with_attribute("地点", "B2");
        let linked = LinkedEntity::new(node.clone(), "书吧", 1.0, "rule");
        let index = EntityIndex::from_linked(&[linked.clone()]);
        let first = CandidateAnswer::from_linked(&linked);
        let mut second = first.clone();
        second.final_score = 0.5;

        let answers = AnswerGenerator::new().generate(vec![first, second], &index).unwrap();

        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].natural_ans.as_deref(), Some("您好，机场内有书吧，位置在B2"));
    }
}
