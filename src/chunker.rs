//! Chunking scanned files into overlapping, token-budgeted pieces

use crate::config::ChunkerConfig;
use crate::error::{IndexError, Result};
use crate::scanner::{estimate_tokens, FileType, SourceFile};
use crate::store::Document;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Characters of overlap converted to carried-over lines for code chunks
const CHARS_PER_OVERLAP_LINE: usize = 50;

/// A contiguous excerpt of a source file with provenance metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable id derived from the relative path and ordinal
    pub id: String,
    pub content: String,
    /// Dense ordinal within the file, 0..total_chunks
    pub ordinal: usize,
    pub total_chunks: usize,
    /// 1-based line range, set for code chunks
    pub start_line: Option<usize>,
    pub end_line: Option<usize>,
    pub language: Option<String>,
    pub file_type: FileType,
    pub relative_path: String,
}

impl Chunk {
    /// Materialize this chunk as an indexable document
    pub fn to_document(&self) -> Document {
        let mut metadata = HashMap::new();
        metadata.insert("file_path".to_string(), self.relative_path.clone());
        metadata.insert("ordinal".to_string(), self.ordinal.to_string());
        metadata.insert("total_chunks".to_string(), self.total_chunks.to_string());
        if let Some(start) = self.start_line {
            metadata.insert("start_line".to_string(), start.to_string());
        }
        if let Some(end) = self.end_line {
            metadata.insert("end_line".to_string(), end.to_string());
        }
        if let Some(language) = &self.language {
            metadata.insert("language".to_string(), language.clone());
        }

        Document {
            id: self.id.clone(),
            title: self.relative_path.clone(),
            content: self.content.clone(),
            path: self.relative_path.clone(),
            doc_type: self.file_type.into(),
            metadata,
        }
    }
}

/// Splits files by a strategy chosen per file type
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
    /// A single logical unit above this estimate fails the file
    max_unit_tokens: usize,
}

impl Chunker {
    pub fn new(config: &ChunkerConfig, max_unit_tokens: usize) -> Self {
        Self {
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
            max_unit_tokens,
        }
    }

    /// Split one file into chunks with dense ordinals.
    ///
    /// The overlap region belongs to both neighboring chunks.
    pub fn chunk_file(&self, file: &SourceFile) -> Result<Vec<Chunk>> {
        let contents = if file.content.len() <= self.chunk_size {
            ChunkContents {
                pieces: vec![file.content.clone()],
                line_ranges: matches!(file.file_type, FileType::Code | FileType::Test)
                    .then(|| vec![(1, file.content.lines().count().max(1))]),
            }
        } else {
            match file.file_type {
                FileType::Code | FileType::Test => self.chunk_code(file)?,
                FileType::Doc => self.chunk_prose(file)?,
                _ => self.chunk_window(&file.content),
            }
        };

        let ChunkContents {
            pieces,
            line_ranges,
        } = contents;
        let total_chunks = pieces.len();
        let chunks = pieces
            .into_iter()
            .enumerate()
            .map(|(ordinal, content)| {
                let (start_line, end_line) = line_ranges
                    .as_ref()
                    .map(|ranges| {
                        let (start, end) = ranges[ordinal];
                        (Some(start), Some(end))
                    })
                    .unwrap_or((None, None));

                Chunk {
                    id: format!("{}#{}", file.relative_path, ordinal),
                    content,
                    ordinal,
                    total_chunks,
                    start_line,
                    end_line,
                    language: file.language.clone(),
                    file_type: file.file_type,
                    relative_path: file.relative_path.clone(),
                }
            })
            .collect();

        debug!("Chunked {} into {} pieces", file.relative_path, total_chunks);
        Ok(chunks)
    }

    /// Line-aware strategy: contiguous line coverage, the last
    /// `overlap / 50` lines of each chunk repeat at the head of the next.
    fn chunk_code(&self, file: &SourceFile) -> Result<ChunkContents> {
        let lines: Vec<&str> = file.content.lines().collect();
        let overlap_lines = self.overlap / CHARS_PER_OVERLAP_LINE;

        for line in &lines {
            if estimate_tokens(line) > self.max_unit_tokens {
                return Err(IndexError::OversizedChunk(file.relative_path.clone()).into());
            }
        }

        let mut pieces = Vec::new();
        let mut ranges = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_len = 0usize;
        let mut start_line = 1usize;

        for (i, line) in lines.iter().enumerate() {
            let line_no = i + 1;
            let line_len = line.len() + 1;

            if !current.is_empty() && current_len + line_len > self.chunk_size {
                let end_line = line_no - 1;
                pieces.push(current.join("\n"));
                ranges.push((start_line, end_line));

                let keep = overlap_lines.min(current.len());
                current = current[current.len() - keep..].to_vec();
                current_len = current.iter().map(|l| l.len() + 1).sum();
                start_line = end_line + 1 - keep;
            }

            current.push(line);
            current_len += line_len;
        }

        if !current.is_empty() {
            pieces.push(current.join("\n"));
            ranges.push((start_line, lines.len()));
        }

        Ok(ChunkContents {
            pieces,
            line_ranges: Some(ranges),
        })
    }

    /// Paragraph strategy: greedy packing with a character tail carried
    /// between chunks.
    fn chunk_prose(&self, file: &SourceFile) -> Result<ChunkContents> {
        let mut pieces: Vec<String> = Vec::new();
        let mut current = String::new();

        for paragraph in file.content.split("\n\n") {
            if paragraph.trim().is_empty() {
                continue;
            }
            if estimate_tokens(paragraph) > self.max_unit_tokens {
                return Err(IndexError::OversizedChunk(file.relative_path.clone()).into());
            }

            if !current.is_empty() && current.len() + 2 + paragraph.len() > self.chunk_size {
                let tail = char_tail(&current, self.overlap).to_string();
                pieces.push(current);
                current = tail;
            }

            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(paragraph);
        }

        if !current.is_empty() {
            pieces.push(current);
        }

        Ok(ChunkContents {
            pieces,
            line_ranges: None,
        })
    }

    /// Fixed sliding window advancing by `chunk_size - overlap` characters
    fn chunk_window(&self, content: &str) -> ChunkContents {
        let step = (self.chunk_size - self.overlap).max(1);
        let mut pieces = Vec::new();
        let mut start = 0usize;

        while start < content.len() {
            let end = floor_char_boundary(content, (start + self.chunk_size).min(content.len()));
            pieces.push(content[start..end].to_string());
            if end == content.len() {
                break;
            }
            start = ceil_char_boundary(content, start + step);
        }

        ChunkContents {
            pieces,
            line_ranges: None,
        }
    }
}

struct ChunkContents {
    pieces: Vec<String>,
    line_ranges: Option<Vec<(usize, usize)>>,
}

/// Last `n` bytes of a string, moved forward to a char boundary
fn char_tail(s: &str, n: usize) -> &str {
    if s.len() <= n {
        return s;
    }
    let mut start = s.len() - n;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(s: &str, mut index: usize) -> usize {
    while index < s.len() && !s.is_char_boundary(index) {
        index += 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn source_file(content: &str, file_type: FileType) -> SourceFile {
        SourceFile {
            path: PathBuf::from("src/sample.rs"),
            relative_path: "src/sample.rs".to_string(),
            size: content.len() as u64,
            modified: None,
            extension: "rs".to_string(),
            file_type,
            language: Some("rust".to_string()),
            token_estimate: estimate_tokens(content),
            content: content.to_string(),
            imports: Vec::new(),
            exports: Vec::new(),
            importance: 0,
        }
    }

    fn chunker(chunk_size: usize, overlap: usize) -> Chunker {
        Chunker::new(
            &ChunkerConfig {
                chunk_size,
                chunk_overlap: overlap,
            },
            100_000,
        )
    }

    #[test]
    fn test_small_file_single_chunk() {
        let file = source_file("fn main() {}\n", FileType::Code);
        let chunks = chunker(1000, 200).chunk_file(&file).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].ordinal, 0);
        assert_eq!(chunks[0].total_chunks, 1);
        assert_eq!(chunks[0].start_line, Some(1));
        assert_eq!(chunks[0].id, "src/sample.rs#0");
    }

    #[test]
    fn test_code_chunks_cover_every_line() {
        let content: String = (1..=30)
            .map(|i| format!("let value_{:02} = compute({:02});", i, i))
            .collect::<Vec<_>>()
            .join("\n");
        let file = source_file(&content, FileType::Code);
        let chunks = chunker(500, 100).chunk_file(&file).unwrap();

        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].start_line, Some(1));

        // Dense ordinals and contiguous coverage with bounded overlap.
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.ordinal, i);
            assert_eq!(chunk.total_chunks, chunks.len());
        }
        for pair in chunks.windows(2) {
            let prev_end = pair[0].end_line.unwrap();
            let next_start = pair[1].start_line.unwrap();
            assert!(next_start <= prev_end + 1, "gap between chunks");
            assert!(prev_end + 1 - next_start <= 100 / 50, "overlap too large");
        }
        assert_eq!(chunks.last().unwrap().end_line, Some(30));

        // Every line appears in at least one chunk.
        for i in 1..=30 {
            let needle = format!("let value_{:02} ", i);
            assert!(chunks.iter().any(|c| c.content.contains(&needle)));
        }
    }

    #[test]
    fn test_prose_chunks_carry_tail_overlap() {
        let paragraphs: Vec<String> = (0..10)
            .map(|i| format!("Paragraph {} talks about the system at length.", i))
            .collect();
        let content = paragraphs.join("\n\n");
        let mut file = source_file(&content, FileType::Doc);
        file.relative_path = "README.md".to_string();

        let chunks = chunker(120, 30).chunk_file(&file).unwrap();
        assert!(chunks.len() > 1);
        assert!(chunks[0].start_line.is_none());

        // The head of each following chunk repeats the tail of the previous.
        for pair in chunks.windows(2) {
            let tail = char_tail(&pair[0].content, 30);
            assert!(pair[1].content.starts_with(tail));
        }
    }

    #[test]
    fn test_window_strategy_advances_by_step() {
        let content = "x".repeat(2500);
        let mut file = source_file(&content, FileType::Config);
        file.relative_path = "settings.json".to_string();

        let chunks = chunker(1000, 200).chunk_file(&file).unwrap();
        // Steps of 800: 0..1000, 800..1800, 1600..2500
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].content.len(), 1000);
        assert_eq!(chunks[2].content.len(), 900);
    }

    #[test]
    fn test_oversized_line_fails_the_file() {
        let content = format!("short line\n{}\n", "y".repeat(800));
        let file = source_file(&content, FileType::Code);
        let result = Chunker::new(
            &ChunkerConfig {
                chunk_size: 100,
                chunk_overlap: 10,
            },
            100,
        )
        .chunk_file(&file);

        assert!(result.is_err());
    }

    #[test]
    fn test_to_document_carries_provenance() {
        let file = source_file("fn main() {}\n", FileType::Code);
        let chunks = chunker(1000, 200).chunk_file(&file).unwrap();
        let document = chunks[0].to_document();

        assert_eq!(document.id, "src/sample.rs#0");
        assert_eq!(document.path, "src/sample.rs");
        assert_eq!(document.metadata.get("start_line").unwrap(), "1");
        assert_eq!(document.metadata.get("language").unwrap(), "rust");
    }
}
