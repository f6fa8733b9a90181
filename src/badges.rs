use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};

/// Badge titles counted toward a student's score.
pub const DEFAULT_BADGE_TITLES: &[&str] = &[
    "The Basics of Google Cloud Compute",
    "Get Started with Cloud Storage",
    "Get Started with Pub/Sub",
    "Get Started with API Gateway",
    "Get Started with Looker",
    "Get Started with Dataplex",
    "Get Started with Google Workspace Tools",
    "App Building with Appsheet",
    "Develop with Apps Script and AppSheet",
    "Build a Website on Google Cloud",
    "Set Up a Google Cloud Network",
    "Store, Process, and Manage Data on Google Cloud - Console",
    "Cloud Functions: 3 Ways",
    "App Engine: 3 Ways",
    "Cloud Speech API: 3 Ways",
    "Monitoring in Google Cloud",
    "Analyze Speech and Language with Google APIs",
    "Prompt Design in Vertex AI",
    "Develop GenAI Apps with Gemini and Streamlit",
    "Gen AI Arcade Game: Level 3",
];

static BADGE_CARD: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.profile-badge").expect("badge card selector"));
static BADGE_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.ql-body-2").expect("badge title selector"));
static DEFAULT_ALLOW_LIST: LazyLock<BadgeAllowList> = LazyLock::new(BadgeAllowList::default);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeAllowList {
    titles: HashSet<String>,
}

impl BadgeAllowList {
    pub fn from_titles<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            titles: titles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, title: &str) -> bool {
        self.titles.contains(title)
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// Counts badge cards whose trimmed title is on this list.
    ///
    /// Cards without a title element are skipped. Markup that is not HTML at
    /// all simply has no cards, so the result is `0`.
    pub fn count_badges(&self, markup: &str) -> u32 {
        let document = Html::parse_document(markup);
        let mut count = 0u32;
        for card in document.select(&BADGE_CARD) {
            let Some(title) = card.select(&BADGE_TITLE).next() else {
                continue;
            };
            let title = title.text().collect::<String>();
            if self.contains(title.trim()) {
                count = count.saturating_add(1);
            }
        }
        count
    }
}

impl Default for BadgeAllowList {
    fn default() -> Self {
        Self::from_titles(DEFAULT_BADGE_TITLES.iter().copied())
    }
}

pub fn extract_badge_count(markup: &str) -> u32 {
    DEFAULT_ALLOW_LIST.count_badges(markup)
}
