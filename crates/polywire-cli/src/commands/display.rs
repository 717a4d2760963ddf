use polywire_core::index::ArticleMatch;
use polywire_core::PollBatch;

const SUMMARY_PREVIEW_CHARS: usize = 300;
pub const MAX_PER_SOURCE: usize = 5;

/// Render the new headlines of a poll batch, grouped by source
pub fn format_headlines(batch: &PollBatch, max_per_source: usize, verbose: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!("\n{}", "=".repeat(60)));
    lines.push("LATEST NEWS HEADLINES (NEW ITEMS ONLY)".to_string());
    lines.push("=".repeat(60));

    for (source, articles) in batch.iter() {
        lines.push(format!("\n{}", source.to_uppercase()));
        lines.push("-".repeat(30));

        for (i, article) in articles.iter().take(max_per_source).enumerate() {
            lines.push(format!("{}. {}", i + 1, article.title));
            lines.push(format!("   Published: {}", article.published));
            lines.push(format!("   Link: {}", article.link));

            if verbose {
                let summary = article.summary_preview(SUMMARY_PREVIEW_CHARS);
                if !summary.is_empty() {
                    lines.push(format!("   Summary: {}", summary));
                }
                if !article.categories.is_empty() {
                    lines.push(format!("   Categories: {}", article.categories.join(", ")));
                }
            }
            lines.push(String::new());
        }
    }

    lines.join("\n")
}

/// Render articles with their closest markets
pub fn format_matches(matches: &[ArticleMatch]) -> String {
    let mut lines = Vec::new();
    lines.push("=".repeat(80));
    lines.push("NEWS ARTICLES & MATCHING PREDICTION MARKETS".to_string());
    lines.push("=".repeat(80));

    if matches.is_empty() {
        lines.push("\nNo new articles found.".to_string());
        return lines.join("\n");
    }

    let mut current_source: Option<&str> = None;
    let mut index = 0;
    for m in matches {
        if current_source != Some(m.article.source.as_str()) {
            current_source = Some(m.article.source.as_str());
            index = 0;
            lines.push(format!("\n{}", m.article.source.to_uppercase()));
            lines.push("=".repeat(m.article.source.chars().count()));
        }
        index += 1;

        lines.push(format!("\n[{}] NEWS ARTICLE:", index));
        lines.push(format!("Title: {}", m.article.title));

        if m.markets.is_empty() {
            lines.push("No matching markets found.".to_string());
            continue;
        }

        lines.push("\nTOP MATCHING MARKETS:".to_string());
        for (j, hit) in m.markets.iter().enumerate() {
            lines.push(format!(
                "  {}. [{:.1}%] {}",
                j + 1,
                hit.score * 100.0,
                hit.market.question
            ));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use polywire_core::feed::{Article, FeedEntry};
    use polywire_core::index::{market_point_id, ScoredPoint};
    use polywire_core::webhook::Market;

    fn article(source: &str, id: &str, summary: &str) -> Article {
        Article::from_entry(
            source,
            FeedEntry {
                id: Some(id.to_string()),
                title: Some(format!("Headline {}", id)),
                link: Some(format!("https://news.example.com/{}", id)),
                summary: Some(summary.to_string()),
                tags: vec!["World".to_string(), "Politics".to_string()],
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_headlines_capped_per_source() {
        let mut batch = PollBatch::new(Utc::now());
        batch.push("bbc news", (0..7).map(|i| article("bbc news", &i.to_string(), "s")).collect());
        batch.push("npr", vec![]);

        let text = format_headlines(&batch, MAX_PER_SOURCE, false);
        assert!(text.contains("BBC NEWS"));
        assert!(text.contains("NPR"));
        assert!(text.contains("5. Headline 4"));
        assert!(!text.contains("Headline 5"));
        assert!(text.contains("   Published: No date"));
        assert!(!text.contains("Summary:"));
    }

    #[test]
    fn test_verbose_headlines_truncate_summary() {
        let mut batch = PollBatch::new(Utc::now());
        batch.push("A", vec![article("A", "1", &"x".repeat(400))]);

        let text = format_headlines(&batch, MAX_PER_SOURCE, true);
        let expected = format!("   Summary: {}...", "x".repeat(300));
        assert!(text.contains(&expected));
        assert!(text.contains("   Categories: World, Politics"));
    }

    #[test]
    fn test_matches_grouped_by_source() {
        let market = Market {
            condition_id: "c1".into(),
            question: "Will it rain?".into(),
            description: String::new(),
            tokens: vec![],
        };
        let matches = vec![
            ArticleMatch {
                article: article("A", "1", "s"),
                markets: vec![ScoredPoint {
                    id: market_point_id("c1"),
                    score: 0.5,
                    market,
                }],
            },
            ArticleMatch {
                article: article("B", "2", "s"),
                markets: vec![],
            },
        ];

        let text = format_matches(&matches);
        assert!(text.contains("1. [50.0%] Will it rain?"));
        assert!(text.contains("\nB\n="));
        assert!(text.contains("No matching markets found."));
        assert!(format_matches(&[]).contains("No new articles found."));
    }
}
