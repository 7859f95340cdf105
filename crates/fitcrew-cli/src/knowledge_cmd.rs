use anyhow::Result;

use fitcrew_core::knowledge::KnowledgeBase;

/// Execute `fitcrew knowledge`: search the body-assessment table, or list
/// its topics when no query is given.
pub fn run_knowledge(kb: &KnowledgeBase, query: Option<&str>, limit: usize) -> Result<()> {
    print!("{}", render(kb, query, limit));
    Ok(())
}

fn render(kb: &KnowledgeBase, query: Option<&str>, limit: usize) -> String {
    let mut out = String::new();
    let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) else {
        out.push_str(&format!("{} entries:\n", kb.len()));
        for entry in kb.entries() {
            out.push_str(&format!("  {:<40} {}\n", entry.topic, entry.category));
        }
        return out;
    };

    let hits = kb.search(query, limit.max(1));
    if hits.is_empty() {
        out.push_str(&format!("No entries matched '{query}'.\n"));
        return out;
    }
    for (i, hit) in hits.iter().enumerate() {
        out.push_str(&format!(
            "[{}] {} ({}, score {})\n    {}\n\n",
            i + 1,
            hit.entry.topic,
            hit.entry.category,
            hit.score,
            hit.entry.content
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kb() -> KnowledgeBase {
        KnowledgeBase::embedded().unwrap()
    }

    #[test]
    fn lists_topics_without_query() {
        let kb = kb();
        let out = render(&kb, None, 3);
        assert!(out.starts_with(&format!("{} entries:", kb.len())));
        assert_eq!(out.lines().count(), kb.len() + 1);
    }

    #[test]
    fn blank_query_lists_topics() {
        let out = render(&kb(), Some("   "), 3);
        assert!(out.contains("entries:"));
    }

    #[test]
    fn search_prints_numbered_hits() {
        let out = render(&kb(), Some("navy neck waist"), 2);
        assert!(out.starts_with("[1] "));
        assert!(!out.contains("[3] "));
    }

    #[test]
    fn reports_no_match() {
        let out = render(&kb(), Some("zzzqqq"), 3);
        assert_eq!(out, "No entries matched 'zzzqqq'.\n");
    }
}
