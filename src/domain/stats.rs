//! Read-only aggregate views over the stored collection.

use std::{cmp::Reverse, collections::HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Protocol, ProtocolId};

/// How many entries the ranked lists hold.
const TOP_N: usize = 5;

/// Aggregate statistics for the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// Number of stored protocols.
    pub total: usize,
    /// Sum of views across all protocols.
    pub total_views: u64,
    /// Most liked protocols, most viewed first among equals.
    #[serde(rename = "mais_populares")]
    pub most_popular: Vec<PopularEntry>,
    /// How many protocols carry each discipline, most frequent first.
    #[serde(rename = "por_disciplina")]
    pub by_discipline: Vec<DisciplineCount>,
    /// Most recently created protocols.
    #[serde(rename = "ultimos")]
    pub most_recent: Vec<RecentEntry>,
}

/// A protocol in the popularity ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopularEntry {
    /// Identity.
    pub id: ProtocolId,
    /// Title.
    #[serde(rename = "titulo")]
    pub title: String,
    /// Author.
    #[serde(rename = "autor")]
    pub author: String,
    /// Likes.
    #[serde(rename = "gostos")]
    pub likes: u64,
    /// Views.
    #[serde(rename = "visualizacoes")]
    pub views: u64,
}

/// Number of protocols tagged with a discipline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisciplineCount {
    /// The discipline tag.
    #[serde(rename = "disciplina")]
    pub discipline: String,
    /// How many protocols carry it.
    pub count: usize,
}

/// A protocol in the recency list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentEntry {
    /// Identity.
    pub id: ProtocolId,
    /// Title.
    #[serde(rename = "titulo")]
    pub title: String,
    /// Author.
    #[serde(rename = "autor")]
    pub author: String,
    /// Creation time.
    #[serde(rename = "data_criacao")]
    pub created_at: DateTime<Utc>,
}

impl Stats {
    /// Aggregates the full collection, in any order.
    ///
    /// Ties are broken by insertion order (ascending id), which makes the
    /// result independent of the order the backend listed the protocols in.
    #[must_use]
    pub fn from_protocols(protocols: &[Protocol]) -> Self {
        let mut by_insertion: Vec<&Protocol> = protocols.iter().collect();
        by_insertion.sort_by_key(|protocol| protocol.id());

        let total_views = by_insertion
            .iter()
            .map(|protocol| protocol.counters().views)
            .sum();

        let mut popular = by_insertion.clone();
        // stable sort keeps insertion order among equals
        popular.sort_by_key(|protocol| {
            let counters = protocol.counters();
            (Reverse(counters.likes), Reverse(counters.views))
        });
        let most_popular = popular
            .into_iter()
            .take(TOP_N)
            .map(|protocol| PopularEntry {
                id: protocol.id(),
                title: protocol.content().title.clone(),
                author: protocol.content().author.clone(),
                likes: protocol.counters().likes,
                views: protocol.counters().views,
            })
            .collect();

        let mut recent = by_insertion.clone();
        recent.sort_by_key(|protocol| Reverse((protocol.created_at(), protocol.id())));
        let most_recent = recent
            .into_iter()
            .take(TOP_N)
            .map(|protocol| RecentEntry {
                id: protocol.id(),
                title: protocol.content().title.clone(),
                author: protocol.content().author.clone(),
                created_at: protocol.created_at(),
            })
            .collect();

        Self {
            total: protocols.len(),
            total_views,
            most_popular,
            by_discipline: discipline_counts(&by_insertion),
            most_recent,
        }
    }
}

fn discipline_counts(protocols: &[&Protocol]) -> Vec<DisciplineCount> {
    let mut first_seen: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for discipline in protocols
        .iter()
        .flat_map(|protocol| protocol.content().disciplines.iter())
    {
        let count = counts.entry(discipline.as_str()).or_insert_with(|| {
            first_seen.push(discipline.as_str());
            0
        });
        *count += 1;
    }

    let mut ranked: Vec<DisciplineCount> = first_seen
        .into_iter()
        .map(|discipline| DisciplineCount {
            discipline: discipline.to_string(),
            count: counts[discipline],
        })
        .collect();
    ranked.sort_by_key(|entry| Reverse(entry.count));
    ranked
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::domain::{Counters, ProtocolDraft};

    fn protocol(id: i64, disciplines: &[&str], likes: u64, views: u64, minute: u32) -> Protocol {
        Protocol::new(
            ProtocolId::new(id),
            ProtocolDraft {
                title: format!("Protocolo {id}"),
                author: "Ana".to_string(),
                disciplines: disciplines.iter().map(ToString::to_string).collect(),
                ..ProtocolDraft::default()
            },
            Counters {
                likes,
                dislikes: 0,
                views,
            },
            Utc.with_ymd_and_hms(2025, 3, 1, 10, minute, 0).unwrap(),
        )
    }

    #[test]
    fn empty_collection() {
        let stats = Stats::from_protocols(&[]);

        assert_eq!(
            serde_json::to_value(&stats).unwrap(),
            json!({
                "total": 0,
                "total_views": 0,
                "mais_populares": [],
                "por_disciplina": [],
                "ultimos": []
            })
        );
    }

    #[test]
    fn discipline_frequency() {
        let stats = Stats::from_protocols(&[
            protocol(2, &["Física", "Química"], 0, 0, 2),
            protocol(1, &["Física"], 0, 0, 1),
        ]);

        assert_eq!(
            stats.by_discipline,
            vec![
                DisciplineCount {
                    discipline: "Física".to_string(),
                    count: 2
                },
                DisciplineCount {
                    discipline: "Química".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn discipline_ties_keep_first_seen_order() {
        let stats = Stats::from_protocols(&[
            protocol(1, &["Química"], 0, 0, 1),
            protocol(2, &["Biologia"], 0, 0, 2),
            protocol(3, &["Biologia", "Química", "Física"], 0, 0, 3),
        ]);

        let order: Vec<_> = stats
            .by_discipline
            .iter()
            .map(|entry| entry.discipline.as_str())
            .collect();
        assert_eq!(order, ["Química", "Biologia", "Física"]);
    }

    #[test]
    fn popularity_ranking() {
        let stats = Stats::from_protocols(&[
            protocol(1, &[], 3, 10, 1),
            protocol(2, &[], 5, 0, 2),
            protocol(3, &[], 3, 20, 3),
            protocol(4, &[], 3, 10, 4),
            protocol(5, &[], 0, 0, 5),
            protocol(6, &[], 1, 1, 6),
        ]);

        let ids: Vec<_> = stats.most_popular.iter().map(|e| e.id.get()).collect();
        assert_eq!(ids, [2, 3, 1, 4, 6]);
        assert_eq!(stats.total, 6);
        assert_eq!(stats.total_views, 41);
    }

    #[test]
    fn most_recent_first() {
        let stats = Stats::from_protocols(&[
            protocol(1, &[], 0, 0, 1),
            protocol(2, &[], 0, 0, 7),
            protocol(3, &[], 0, 0, 3),
            protocol(4, &[], 0, 0, 3),
            protocol(5, &[], 0, 0, 5),
            protocol(6, &[], 0, 0, 6),
        ]);

        let ids: Vec<_> = stats.most_recent.iter().map(|e| e.id.get()).collect();
        assert_eq!(ids, [2, 6, 5, 4, 3]);
    }
}
