use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kart", about = "Distributed version control for tabular and geospatial data", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Repository root to operate on (defaults to the current directory).
    #[arg(long, global = true)]
    pub repo: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a new repository
    Init(InitArgs),
    /// Clone an existing repository
    Clone(CloneArgs),
    /// Import a dataset into the repository (driver support out of scope)
    Import(ImportArgs),
    /// Check out a branch, replacing the working copy entirely
    Checkout(CheckoutArgs),
    /// Switch to a different branch
    Switch(SwitchArgs),
    /// Restore specific datasets from a commit without touching the rest
    Restore(RestoreArgs),
    /// Discard uncommitted changes
    Reset(ResetArgs),
    /// Show working-copy status
    Status(StatusArgs),
    /// Show changes between commits, or between a commit and the working copy
    Diff(DiffArgs),
    /// Record the working copy's changes as a new commit
    Commit(CommitArgs),
    /// Show commit history
    Log(LogArgs),
    /// Show a single commit
    Show(ShowArgs),
    /// Merge another branch into the current one
    Merge(MergeArgs),
    /// List the in-progress merge's unresolved conflicts
    Conflicts(ConflictsArgs),
    /// Resolve one conflict of an in-progress merge
    Resolve(ResolveArgs),
    /// Abort an in-progress merge
    MergeAbort(MergeAbortArgs),
    /// Check repository and working-copy integrity
    Fsck(FsckArgs),
    /// Precompute and cache feature-change-count annotations
    BuildAnnotations(BuildAnnotationsArgs),
    /// LFS/tile-pointer maintenance
    #[command(name = "lfs+")]
    LfsPlus(LfsPlusArgs),
}

#[derive(Args)]
pub struct LfsPlusArgs {
    #[command(subcommand)]
    pub action: LfsCommand,
}

#[derive(Subcommand)]
pub enum LfsCommand {
    /// List the tile files referenced by a commit range
    LsFiles(LsFilesArgs),
}

#[derive(Args)]
pub struct InitArgs {
    pub path: Option<String>,
    #[arg(long)]
    pub bare: bool,
}

#[derive(Args)]
pub struct CloneArgs {
    pub source: String,
    pub path: Option<String>,
    #[arg(long)]
    pub bare: bool,
}

#[derive(Args)]
pub struct ImportArgs {
    pub source: String,
    pub dataset: Option<String>,
}

#[derive(Args)]
pub struct CheckoutArgs {
    pub branch: String,
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct SwitchArgs {
    pub branch: String,
    #[arg(short = 'c', long)]
    pub create: bool,
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct RestoreArgs {
    /// Dataset paths to restore. Empty means every dataset.
    pub datasets: Vec<String>,
    #[arg(long)]
    pub source: Option<String>,
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ResetArgs {
    pub target: Option<String>,
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct StatusArgs {
    #[arg(long, default_value = "text")]
    pub output: OutputFormat,
}

#[derive(Args)]
pub struct DiffArgs {
    pub old: Option<String>,
    pub new: Option<String>,
    #[arg(long, default_value = "text")]
    pub output: OutputFormat,
    #[arg(long)]
    pub only_feature_count: Option<FeatureCountMode>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Geojson,
    Html,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum FeatureCountMode {
    Exact,
    Fast,
}

#[derive(Args)]
pub struct CommitArgs {
    #[arg(short, long)]
    pub message: String,
}

#[derive(Args)]
pub struct LogArgs {
    pub from: Option<String>,
}

#[derive(Args)]
pub struct ShowArgs {
    pub commit: String,
}

#[derive(Args)]
pub struct MergeArgs {
    pub branch: String,
    #[arg(long, group = "ff_mode")]
    pub ff: bool,
    #[arg(long = "no-ff", group = "ff_mode")]
    pub no_ff: bool,
    #[arg(long = "ff-only", group = "ff_mode")]
    pub ff_only: bool,
    #[arg(short, long)]
    pub message: Option<String>,
}

#[derive(Args)]
pub struct ConflictsArgs {}

#[derive(Args)]
pub struct ResolveArgs {
    pub key: String,
    #[arg(long, group = "resolution")]
    pub ancestor: bool,
    #[arg(long, group = "resolution")]
    pub ours: bool,
    #[arg(long, group = "resolution")]
    pub theirs: bool,
    #[arg(long, group = "resolution")]
    pub delete: bool,
    #[arg(long, group = "resolution")]
    pub with: Option<String>,
}

#[derive(Args)]
pub struct MergeAbortArgs {}

#[derive(Args)]
pub struct FsckArgs {}

#[derive(Args)]
pub struct BuildAnnotationsArgs {
    #[arg(long)]
    pub all_reachable: bool,
}

#[derive(Args)]
pub struct LsFilesArgs {
    pub range: Option<String>,
    #[arg(long)]
    pub all: bool,
}
