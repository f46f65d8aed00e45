use hark_speech::TtsError;
use thiserror::Error;
use tracing::{error, info, warn};

use super::{ErrorKind, Payload, StateBehavior, StateKind, Step, Transition};
use crate::context::Context;
use crate::query::{QueryError, Reply};
use crate::renderer::RendererEvent;
use crate::signal::Signal;

/// Spoken when the reply carries no answer text.
pub const FALLBACK_ANSWER: &str = "I don't have an answer to this";

/// Table rows read out after the header.
pub const MAX_TABLE_ROWS: usize = 4;

#[derive(Debug, Error)]
enum BusyError {
    #[error("query failed: {0}")]
    Query(#[from] QueryError),
    #[error("speech failed: {0}")]
    Speech(#[from] TtsError),
}

impl BusyError {
    fn kind(&self) -> Option<ErrorKind> {
        match self {
            BusyError::Query(e) if e.is_connection() => Some(ErrorKind::Connection),
            _ => None,
        }
    }
}

/// Lines to speak for `reply`, in order: the answer (or the fallback), the
/// table header and its first rows, then the feed titles.
pub fn spoken_lines(reply: &Reply) -> Vec<String> {
    let mut lines = vec![
        reply
            .answer
            .clone()
            .unwrap_or_else(|| FALLBACK_ANSWER.to_string()),
    ];

    if let Some(table) = &reply.table {
        lines.extend(table.head.iter().cloned());
        for row in table.data.iter().take(MAX_TABLE_ROWS) {
            lines.extend(row.iter().cloned());
        }
    }

    if let Some(feed) = &reply.feed {
        let count = feed.count.min(feed.entities.len());
        lines.extend(feed.entities[..count].iter().map(|e| e.title.clone()));
    }

    lines
}

/// Asks the query service and speaks its reply.
pub struct BusyState<'a> {
    ctx: &'a Context,
}

impl<'a> BusyState<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    fn answer(&self, utterance: &str) -> Result<(), BusyError> {
        let ctx = self.ctx;

        ctx.signals().assert(Signal::Processing);
        let reply = ctx.block_on(ctx.query().ask(utterance));
        ctx.signals().deassert(Signal::Processing);
        let reply = reply?;

        ctx.signals().assert(Signal::Speaking);
        let lines = spoken_lines(&reply);
        ctx.notify(RendererEvent::Speaking { reply });

        for line in &lines {
            info!(line = %line, "reply");
            ctx.say(line)?;
        }
        Ok(())
    }
}

impl StateBehavior for BusyState<'_> {
    fn kind(&self) -> StateKind {
        StateKind::Busy
    }

    fn on_enter(&self, payload: Payload) -> Step {
        let Payload::Utterance(utterance) = payload else {
            error!(?payload, "busy state entered without an utterance");
            return Transition::error(None).into();
        };

        match self.answer(&utterance) {
            Ok(()) => Transition::to(StateKind::Idle).into(),
            Err(e) => {
                warn!(utterance = %utterance, "failed to answer: {}", e);
                Transition::error(e.kind()).into()
            }
        }
    }

    fn on_exit(&self) {
        self.ctx.reset_signals();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Entity, Feed, Table};

    fn entity(title: &str) -> Entity {
        Entity {
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_reply_speaks_fallback() {
        assert_eq!(spoken_lines(&Reply::default()), vec![FALLBACK_ANSWER]);
    }

    #[test]
    fn test_table_limited_to_four_rows() {
        let reply = Reply {
            answer: Some("Cities".to_string()),
            table: Some(Table {
                head: vec!["City".to_string(), "Country".to_string()],
                data: (1..=6)
                    .map(|i| vec![format!("c{}", i), format!("n{}", i)])
                    .collect(),
            }),
            feed: None,
        };

        let lines = spoken_lines(&reply);
        assert_eq!(
            lines,
            vec!["Cities", "City", "Country", "c1", "n1", "c2", "n2", "c3", "n3", "c4", "n4"]
        );
    }

    #[test]
    fn test_feed_bounded_by_entities_present() {
        let reply = Reply {
            answer: None,
            table: None,
            feed: Some(Feed {
                entities: vec![entity("first"), entity("second")],
                count: 3,
            }),
        };
        assert_eq!(spoken_lines(&reply), vec![FALLBACK_ANSWER, "first", "second"]);
    }

    #[test]
    fn test_feed_bounded_by_count() {
        let reply = Reply {
            answer: Some("news".to_string()),
            table: None,
            feed: Some(Feed {
                entities: vec![entity("a"), entity("b"), entity("c")],
                count: 1,
            }),
        };
        assert_eq!(spoken_lines(&reply), vec!["news", "a"]);
    }

    #[test]
    fn test_error_classification() {
        let connection = BusyError::from(QueryError::Connection("timed out".to_string()));
        assert_eq!(connection.kind(), Some(ErrorKind::Connection));

        let malformed = BusyError::from(QueryError::InvalidReply("no answers".to_string()));
        assert_eq!(malformed.kind(), None);

        let speech = BusyError::from(TtsError::Process("flite missing".to_string()));
        assert_eq!(speech.kind(), None);
    }
}
