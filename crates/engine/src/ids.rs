use crate::error::{RepairError, Result};
use crate::model::{ObjectId, ID_LEN};
use std::collections::HashSet;
use std::fmt::Write as _;

/// Produces candidate identifiers; uniqueness is the allocator's job
pub trait IdSource {
    fn candidate(&mut self) -> Result<ObjectId>;
}

/// 96 random bits from the OS, rendered as 24 uppercase hex digits
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdSource;

impl IdSource for RandomIdSource {
    fn candidate(&mut self) -> Result<ObjectId> {
        let mut bytes = [0u8; ID_LEN / 2];
        getrandom::getrandom(&mut bytes)
            .map_err(|err| RepairError::Io(std::io::Error::other(err.to_string())))?;
        let mut hex = String::with_capacity(ID_LEN);
        for byte in bytes {
            let _ = write!(hex, "{byte:02X}");
        }
        Ok(ObjectId::from_matched(&hex))
    }
}

/// Collision-checked allocator over the store's identifier space
pub struct IdAllocator<S = RandomIdSource> {
    source: S,
    taken: HashSet<ObjectId>,
    max_attempts: usize,
}

impl IdAllocator<RandomIdSource> {
    #[must_use]
    pub fn new(taken: HashSet<ObjectId>, max_attempts: usize) -> Self {
        Self::with_source(RandomIdSource, taken, max_attempts)
    }
}

impl<S: IdSource> IdAllocator<S> {
    pub fn with_source(source: S, taken: HashSet<ObjectId>, max_attempts: usize) -> Self {
        Self {
            source,
            taken,
            max_attempts,
        }
    }

    /// Draw until a candidate is free, then reserve it for the rest of the run
    pub fn allocate(&mut self) -> Result<ObjectId> {
        for attempt in 1..=self.max_attempts {
            let candidate = self.source.candidate()?;
            if self.taken.insert(candidate.clone()) {
                return Ok(candidate);
            }
            log::debug!("identifier {candidate} already taken (attempt {attempt}), redrawing");
        }
        Err(RepairError::IdentifierExhausted {
            attempts: self.max_attempts,
        })
    }

    #[must_use]
    pub fn is_taken(&self, id: &ObjectId) -> bool {
        self.taken.contains(id)
    }
}
