//! Fragment types and the fold that turns a fragment stream into one message.

use async_stream::stream;
use futures_core::stream::Stream;
use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::io::StreamReader;
use tracing::{debug, trace};

use crate::core::RawByteStream;
use crate::error::{AIError, GeminiError};
use crate::models::GroundingSource;

/// Text emitted in place of a reply when the backend stream faults.
pub const APOLOGY_TEXT: &str = "I encountered an error. Let's try again.";

/// One incremental unit of generated text plus the sources cited with it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

impl Fragment {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), sources: Vec::new() }
    }

    pub fn with_sources(text: impl Into<String>, sources: Vec<GroundingSource>) -> Self {
        Self { text: text.into(), sources }
    }

    /// Terminal fragment that replaces a failed stream.
    pub fn apology() -> Self {
        Self::text(APOLOGY_TEXT)
    }
}

/// Running state of one model turn: concatenated text and the deduplicated
/// union of every source seen so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseAccumulator {
    content: String,
    sources: Vec<GroundingSource>,
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: &Fragment) {
        self.content.push_str(&fragment.text);
        merge_sources(&mut self.sources, &fragment.sources);
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn sources(&self) -> &[GroundingSource] {
        &self.sources
    }

    /// Sources as attached to a message: `None` while none have been cited.
    pub fn sources_if_any(&self) -> Option<Vec<GroundingSource>> {
        (!self.sources.is_empty()).then(|| self.sources.clone())
    }
}

/// Append `incoming` sources whose uri is not already present. The first
/// title seen for a uri wins.
pub fn merge_sources(existing: &mut Vec<GroundingSource>, incoming: &[GroundingSource]) {
    for source in incoming {
        if !existing.iter().any(|s| s.uri == source.uri) {
            existing.push(source.clone());
        }
    }
}

/// Drain a fragment stream into an accumulator.
pub async fn collect_fragments<S>(stream: S) -> ResponseAccumulator
where
    S: Stream<Item = Fragment>,
{
    let mut accumulator = ResponseAccumulator::new();
    futures_util::pin_mut!(stream);
    while let Some(fragment) = stream.next().await {
        accumulator.push(&fragment);
    }
    accumulator
}

/// Split a Server-Sent Events byte stream into the payloads of its `data:`
/// fields, one item per event. Multi-line data fields are joined with `\n`;
/// other fields and comments are skipped. A trailing event without the
/// closing blank line is still emitted.
pub fn sse_data_events(byte_stream: RawByteStream) -> impl Stream<Item = Result<String, AIError>> {
    stream! {
        let io_stream = byte_stream.map(|res| {
            res.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        });
        let reader = StreamReader::new(io_stream);
        let mut lines = BufReader::new(reader).lines();
        let mut data = String::new();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.is_empty() {
                        if !data.is_empty() {
                            trace!(target: "lumina_tutor::sse", len = data.len(), "sse event");
                            yield Ok(std::mem::take(&mut data));
                        }
                    } else if let Some(payload) = line.strip_prefix("data:") {
                        if !data.is_empty() { data.push('\n'); }
                        data.push_str(payload.strip_prefix(' ').unwrap_or(payload));
                    }
                }
                Ok(None) => {
                    if !data.is_empty() {
                        yield Ok(std::mem::take(&mut data));
                    }
                    debug!(target: "lumina_tutor::sse", "sse stream closed");
                    break;
                }
                Err(e) => {
                    yield Err(AIError::Gemini(GeminiError::Stream(e.to_string())));
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(uri: &str, title: &str) -> GroundingSource {
        GroundingSource { uri: uri.to_string(), title: title.to_string() }
    }

    #[test]
    fn accumulator_concatenates_in_arrival_order() {
        let mut acc = ResponseAccumulator::new();
        for piece in ["Frac", "tions are ", "", "parts of a whole."] {
            acc.push(&Fragment::text(piece));
        }
        assert_eq!(acc.content(), "Fractions are parts of a whole.");
        assert!(acc.sources_if_any().is_none());
    }

    #[test]
    fn repeated_uris_keep_first_title() {
        let mut acc = ResponseAccumulator::new();
        acc.push(&Fragment::with_sources("a", vec![source("https://a.example", "First A")]));
        acc.push(&Fragment::with_sources(
            "b",
            vec![source("https://b.example", "B"), source("https://a.example", "Second A")],
        ));
        acc.push(&Fragment::with_sources("c", vec![source("https://b.example", "B again")]));

        assert_eq!(
            acc.sources(),
            &[source("https://a.example", "First A"), source("https://b.example", "B")]
        );
    }
}
