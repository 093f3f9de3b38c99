//! Keyword-table classifier with an optional generative fallback.

use tracing::debug;

use super::ai_adapter::DynGenerator;
use crate::ingest::truncate_chars;
use crate::ingest::types::Article;
use crate::store::Category;

/// Content excerpt handed to the generator.
const PROMPT_CONTENT_CHARS: usize = 500;

/// Bilingual keyword lists, in category priority order. `industry` has no
/// table entry and is only reachable through the generator.
const KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Breakthrough,
        &["breakthrough", "突破", "milestone", "里程碑", "achievement", "achieved"],
    ),
    (
        Category::ProductLaunch,
        &["launch", "发布", "release", "announce", "announcement", "unveil"],
    ),
    (
        Category::Funding,
        &["funding", "融资", "raise", "acquisition", "收购", "merger", "并购", "investment"],
    ),
    (
        Category::Policy,
        &["policy", "政策", "regulation", "法规", "law", "法律", "government"],
    ),
    (
        Category::Research,
        &["research", "研究", "paper", "论文", "study", "academic"],
    ),
    (
        Category::Interview,
        &["interview", "访谈", "talk", "conversation"],
    ),
];

/// Strictly highest nonzero keyword count; ties go to the earlier category.
pub fn classify_by_keywords(article: &Article) -> Option<Category> {
    let text = format!("{} {}", article.title, article.content).to_lowercase();
    let mut best: Option<(Category, usize)> = None;
    for (cat, words) in KEYWORDS {
        let hits = words.iter().filter(|w| text.contains(*w)).count();
        if hits > 0 && best.map_or(true, |(_, n)| hits > n) {
            best = Some((*cat, hits));
        }
    }
    best.map(|(c, _)| c)
}

pub struct Classifier {
    generator: Option<DynGenerator>,
}

impl Classifier {
    pub fn new(generator: Option<DynGenerator>) -> Self {
        Self { generator }
    }

    pub async fn classify(&self, article: &Article) -> Category {
        if let Some(c) = classify_by_keywords(article) {
            return c;
        }
        if let Some(c) = self.classify_with_generator(article).await {
            return c;
        }
        Category::Other
    }

    async fn classify_with_generator(&self, article: &Article) -> Option<Category> {
        let generator = self.generator.as_ref()?;
        let names = Category::ALL
            .iter()
            .map(|c| format!("- {}", c.name()))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Classify this AI news item into exactly one of these categories:\n{names}\n\n\
             Title: {}\nContent: {}\n\nAnswer with the category name only.",
            article.title,
            truncate_chars(&article.content, PROMPT_CONTENT_CHARS),
        );
        let answer = generator.generate(&prompt, 20).await?;
        let cat = Category::from_name(&answer);
        if cat.is_none() {
            debug!(answer = %answer, "generator answered an unknown category");
        }
        cat
    }
}
