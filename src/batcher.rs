use catalog_types::product::NormalizedRow;

/// Groups rows into batches of at most `batch_size`, preserving order.
pub struct Batcher {
    batch_size: usize,
    buf: Vec<NormalizedRow>,
}

impl Batcher {
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            buf: Vec::with_capacity(batch_size),
        }
    }

    /// Returns a full batch once `batch_size` rows have accumulated.
    pub fn push(&mut self, row: NormalizedRow) -> Option<Vec<NormalizedRow>> {
        self.buf.push(row);
        if self.buf.len() >= self.batch_size {
            Some(std::mem::replace(
                &mut self.buf,
                Vec::with_capacity(self.batch_size),
            ))
        } else {
            None
        }
    }

    /// The trailing partial batch, if any row is left.
    pub fn finish(self) -> Option<Vec<NormalizedRow>> {
        Some(self.buf).filter(|b| !b.is_empty())
    }
}
