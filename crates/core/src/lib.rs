pub mod advisor;
pub mod client;
pub mod config;
pub mod input;
pub mod job;
pub mod orchestrator;
pub mod progress;
pub mod sequencer;
pub mod testing;

pub use advisor::{normalize_format, FormatAdvisor, MediaCategory};
pub use client::{
    create_client, ClientError, CloudConvertClient, ConversionClient, JobHandle, ResultReference,
    SimulatedClient,
};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, ClientBackend,
    Config, ConfigError, SanitizedConfig,
};
pub use input::{InputFile, LocalFile, MemoryFile};
pub use job::{Batch, ConversionJob, JobError, JobOutcome, JobState};
pub use orchestrator::{BatchEntry, BatchError, BatchOrchestrator, BatchResult, PlannedJob};
pub use progress::{ChannelSink, NoopSink, ProgressEvent, ProgressSink};
pub use sequencer::{JobSequencer, SequencerConfig};
