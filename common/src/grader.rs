//! A block grader bound to one protocol version and one height.

use crate::block::GradedBlock;
use crate::difficulty::{self, DifficultyHash, Sha256Hash};
use crate::dedup;
use crate::grading;
use crate::winners;
use crate::{AssetRegistry, GradedRecord, GraderError, GraderVersion, GradingParams, Record};
use log::{debug, info};

/// Collects the submissions for one height and grades them exactly once.
///
/// The height and the previous height's winners are fixed at construction.
/// Grading again returns the cached result.
#[derive(Debug, Clone)]
pub struct BlockGrader<H = Sha256Hash> {
    version: GraderVersion,
    params: GradingParams,
    height: i32,
    previous_winners: Vec<String>,
    registry: AssetRegistry,
    hasher: H,
    records: Vec<Record>,
    graded: Option<GradedBlock>,
}

impl BlockGrader<Sha256Hash> {
    /// Create a grader for a protocol version number using the bundled hash primitive.
    ///
    /// # Errors
    /// Returns [`GraderError::UnknownVersion`] if the version is not supported.
    pub fn new(
        version: u8,
        height: i32,
        previous_winners: Vec<String>,
        registry: AssetRegistry,
    ) -> Result<Self, GraderError> {
        Self::with_hasher(version, height, previous_winners, registry, Sha256Hash)
    }
}

impl<H: DifficultyHash> BlockGrader<H> {
    /// Create a grader for a protocol version number with a custom hash primitive.
    ///
    /// # Errors
    /// Returns [`GraderError::UnknownVersion`] if the version is not supported.
    pub fn with_hasher(
        version: u8,
        height: i32,
        previous_winners: Vec<String>,
        registry: AssetRegistry,
        hasher: H,
    ) -> Result<Self, GraderError> {
        let version = GraderVersion::try_from(version)?;
        Ok(Self::for_version(
            version,
            height,
            previous_winners,
            registry,
            hasher,
        ))
    }

    pub fn for_version(
        version: GraderVersion,
        height: i32,
        previous_winners: Vec<String>,
        registry: AssetRegistry,
        hasher: H,
    ) -> Self {
        Self {
            version,
            params: version.params(),
            height,
            previous_winners,
            registry,
            hasher,
            records: Vec::new(),
            graded: None,
        }
    }

    /// Queue a submission for grading.
    ///
    /// # Errors
    /// Returns [`GraderError::AlreadyGraded`] once the block has been graded.
    pub fn add_record(&mut self, record: Record) -> Result<(), GraderError> {
        if self.graded.is_some() {
            return Err(GraderError::AlreadyGraded {
                height: self.height,
            });
        }
        self.records.push(record);
        Ok(())
    }

    /// Queue several submissions.
    ///
    /// # Errors
    /// Returns [`GraderError::AlreadyGraded`] once the block has been graded.
    pub fn add_records<I>(&mut self, records: I) -> Result<(), GraderError>
    where
        I: IntoIterator<Item = Record>,
    {
        if self.graded.is_some() {
            return Err(GraderError::AlreadyGraded {
                height: self.height,
            });
        }
        self.records.extend(records);
        Ok(())
    }

    /// Run the full pipeline: duplicates, difficulty, then grading of well-formed records.
    /// Only the first call does any work.
    pub fn grade(&mut self) -> &GradedBlock {
        let block = match self.graded.take() {
            Some(block) => {
                debug!("Height {} already graded, returning cached result", self.height);
                block
            }
            None => self.run(),
        };
        self.graded.insert(block)
    }

    fn run(&mut self) -> GradedBlock {
        let submitted = std::mem::take(&mut self.records);
        let total = submitted.len();

        let mut unique = dedup::remove_duplicate_submissions(submitted);
        let unique_count = unique.len();
        if unique_count < self.params.minimum {
            info!(
                "Height {}: {} unique submissions of {}, no winners",
                self.height, unique_count, total
            );
            return GradedBlock::without_quorum(self.height, self.version, unique_count, 0);
        }

        // Malformed records still take a verification slot; grading drops them
        difficulty::sort_by_claimed_difficulty(&mut unique);
        let verification =
            difficulty::verify_top_difficulty(unique, self.params.limit, &self.hasher);
        let honest_count = verification.honest.len();

        let block = match grading::grade_honest(
            verification.honest,
            &self.params,
            self.registry.len(),
        ) {
            Some(outcome) => GradedBlock::from_outcome(
                self.height,
                self.version,
                unique_count,
                honest_count,
                outcome,
            ),
            None => GradedBlock::without_quorum(
                self.height,
                self.version,
                unique_count,
                honest_count,
            ),
        };
        info!(
            "Height {} graded with {}: {} submitted, {} unique, {} hashed, {} honest, {} winners",
            self.height,
            self.version,
            total,
            unique_count,
            verification.hashed,
            honest_count,
            block.winners.len()
        );
        block
    }

    /// Submissions held: everything added before grading, the honest records kept after.
    pub fn count(&self) -> usize {
        match &self.graded {
            Some(block) => block.honest_count,
            None => self.records.len(),
        }
    }

    /// The winners, best first. Empty before grading and for heights without a quorum.
    pub fn winners(&self) -> &[GradedRecord] {
        self.graded
            .as_ref()
            .map(|b| b.winners.as_slice())
            .unwrap_or_default()
    }

    pub fn graded(&self) -> Option<&GradedBlock> {
        self.graded.as_ref()
    }

    pub fn previous_winners(&self) -> &[String] {
        &self.previous_winners
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn version(&self) -> GraderVersion {
        self.version
    }

    pub fn params(&self) -> &GradingParams {
        &self.params
    }

    /// Check a record's references against this height's previous winners.
    pub fn verify_prior_winners(&self, record: &Record) -> bool {
        winners::verify_winners(&record.prior_winner_refs, &self.previous_winners)
    }
}
