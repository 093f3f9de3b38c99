//! Last-resort English→Chinese term substitution.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

const TERMS: &[(&str, &str)] = &[
    // core terms
    ("artificial intelligence", "人工智能"),
    ("machine learning", "机器学习"),
    ("deep learning", "深度学习"),
    ("neural network", "神经网络"),
    ("large language model", "大语言模型"),
    ("natural language processing", "自然语言处理"),
    ("computer vision", "计算机视觉"),
    ("reinforcement learning", "强化学习"),
    ("generative ai", "生成式AI"),
    ("transformer", "Transformer模型"),
    // verbs
    ("announced", "宣布"),
    ("launched", "推出"),
    ("released", "发布"),
    ("introduced", "推出"),
    ("unveiled", "发布"),
    ("developed", "开发"),
    ("trained", "训练"),
    ("improved", "改进"),
    ("enhanced", "增强"),
    ("updated", "更新"),
    // nouns
    ("model", "模型"),
    ("dataset", "数据集"),
    ("algorithm", "算法"),
    ("research", "研究"),
    ("paper", "论文"),
    ("benchmark", "基准测试"),
    ("performance", "性能"),
    ("accuracy", "准确率"),
    ("efficiency", "效率"),
    ("capability", "能力"),
    ("feature", "功能"),
    ("tool", "工具"),
    ("application", "应用"),
    ("system", "系统"),
    ("platform", "平台"),
    ("technology", "技术"),
    ("company", "公司"),
    ("startup", "初创公司"),
    ("funding", "融资"),
    ("acquisition", "收购"),
    ("partnership", "合作"),
    ("collaboration", "协作"),
    // companies
    ("google", "谷歌"),
    ("microsoft", "微软"),
    ("amazon", "亚马逊"),
    ("apple", "苹果"),
    ("nvidia", "英伟达"),
];

static LOOKUP: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| TERMS.iter().copied().collect());

/// One alternation, longest terms first, so "large language model" wins over "model".
static RE_TERMS: Lazy<Regex> = Lazy::new(|| {
    let mut keys: Vec<&str> = TERMS.iter().map(|(k, _)| *k).collect();
    keys.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    let alt = keys
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alt})\b")).unwrap()
});

/// Substitute known terms, case-insensitively. Returns `text` unchanged when
/// nothing matched.
pub fn translate(text: &str) -> String {
    if !RE_TERMS.is_match(text) {
        return text.to_string();
    }
    RE_TERMS
        .replace_all(text, |caps: &Captures| {
            let m = &caps[0];
            LOOKUP
                .get(m.to_lowercase().as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| m.to_string())
        })
        .into_owned()
}
