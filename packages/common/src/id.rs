use crc32fast::Hasher;

/// Generate a stable scope seed from an entity scope id using CRC32
pub fn get_scope_seed(entity_id: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(entity_id.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Sequential ID generator for blocks within one entity scope
#[derive(Debug, Clone)]
pub struct IdGenerator {
    seed: String, // Entity scope seed (CRC32)
    count: u32,   // Sequential counter
}

impl IdGenerator {
    pub fn new(entity_id: &str) -> Self {
        Self {
            seed: get_scope_seed(entity_id),
            count: 0,
        }
    }

    /// Generate next sequential ID
    pub fn new_id(&mut self) -> String {
        self.count += 1;
        format!("{}-{}", self.seed, self.count)
    }

    /// Move the counter past ids already present in a loaded tree.
    ///
    /// Loaded documents carry ids minted by earlier sessions; without this
    /// the generator would hand out duplicates.
    pub fn advance_past<'a>(&mut self, existing: impl Iterator<Item = &'a str>) {
        for id in existing {
            if let Some(tail) = id.strip_prefix(&format!("{}-", self.seed)) {
                if let Ok(n) = tail.parse::<u32>() {
                    self.count = self.count.max(n);
                }
            }
        }
    }

    /// Get scope seed
    pub fn seed(&self) -> &str {
        &self.seed
    }
}
