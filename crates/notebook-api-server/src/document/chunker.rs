use anyhow::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub index: usize,
    pub content: String,
    /// Character offsets into the source text
    pub start_pos: usize,
    pub end_pos: usize,
}

/// Fixed-width character windows with overlap.
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }

    pub fn chunk(&self, text: &str) -> Result<Vec<Chunk>> {
        if self.chunk_size == 0 || self.overlap >= self.chunk_size {
            anyhow::bail!(
                "Invalid chunking parameters: size={} overlap={}",
                self.chunk_size,
                self.overlap
            );
        }

        let mut chunks = Vec::new();
        let chars: Vec<char> = text.chars().collect();
        let total_len = chars.len();
        let step = self.chunk_size - self.overlap;

        let mut start = 0;
        while start < total_len {
            let end = std::cmp::min(start + self.chunk_size, total_len);
            let content: String = chars[start..end].iter().collect();

            // Whitespace-only windows carry nothing worth embedding
            if !content.trim().is_empty() {
                chunks.push(Chunk {
                    index: chunks.len(),
                    content: content.trim().to_string(),
                    start_pos: start,
                    end_pos: end,
                });
            }

            if end >= total_len {
                break;
            }
            start += step;
        }

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_has_no_chunks() {
        let chunker = TextChunker::new(10, 2);
        assert!(chunker.chunk("").unwrap().is_empty());
        assert!(chunker.chunk("   \n\t ").unwrap().is_empty());
    }

    #[test]
    fn test_windows_overlap() {
        let chunker = TextChunker::new(10, 4);
        let chunks = chunker.chunk("abcdefghijklmnopqrstuvwxyz").unwrap();

        assert_eq!(chunks[0].content, "abcdefghij");
        assert_eq!(chunks[1].content, "ghijklmnop");
        assert_eq!(chunks[1].start_pos, 6);
        assert_eq!(chunks.last().unwrap().end_pos, 26);
        assert!(chunks.iter().enumerate().all(|(i, c)| c.index == i));
    }

    #[test]
    fn test_multibyte_text_is_split_on_chars() {
        let chunker = TextChunker::new(3, 1);
        let chunks = chunker.chunk("héllo wörld").unwrap();
        assert_eq!(chunks[0].content, "hél");
        assert!(chunks.iter().all(|c| c.content.chars().count() <= 3));
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_size() {
        assert!(TextChunker::new(5, 5).chunk("text").is_err());
        assert!(TextChunker::new(0, 0).chunk("text").is_err());
    }
}
