use std::collections::BTreeMap;
use std::path::PathBuf;

use colored::Colorize;
use kart_diff::{KeyFilter, PartFilter, RepoDiff};
use kart_merge::{FastForwardMode, MergeOutcome, Resolve};
use kart_repo::{ObjectId, Repository};
use kart_store::ObjectStore;
use kart_types::DatasetPath;

use crate::cli::*;

/// Stable exit codes a caller can script against.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERIC_FAILURE: i32 = 1;
    pub const INVALID_ARGUMENT: i32 = 2;
    pub const INVALID_OPERATION: i32 = 20;
    pub const NOT_A_REPOSITORY: i32 = 41;
    pub const NO_CHANGES: i32 = 44;
    pub const NO_COMMIT: i32 = 45;
    pub const MERGE_CONFLICTS: i32 = 100;
}

/// A CLI-level failure carrying the exit code the process should terminate
/// with, distinct from the human-readable message `anyhow` already prints.
#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// The exit code a [`kart_repo::RepoError`] should surface as, per the
/// CLI's stable exit-code contract. Used by `main` once a command has
/// already failed with `?` through the ordinary `anyhow` blanket
/// conversion -- by the time we see the error there, it's type-erased, so
/// this is looked up via `downcast_ref` rather than threaded through.
pub fn exit_code_for_repo_error(err: &kart_repo::RepoError) -> i32 {
    use kart_repo::RepoError::*;
    match err {
        NotARepository(_) => exit_code::NOT_A_REPOSITORY,
        NoChanges => exit_code::NO_CHANGES,
        NoCommit => exit_code::NO_COMMIT,
        MergeConflicts(_) => exit_code::MERGE_CONFLICTS,
        AlreadyExists(_) | BranchNotFound(_) | RefNotFound(_) | InvalidOperation(_) | UnsupportedVersion(_)
        | MergeInProgress | NoMergeInProgress => exit_code::INVALID_OPERATION,
        _ => exit_code::GENERIC_FAILURE,
    }
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let repo_root = PathBuf::from(cli.repo.clone().unwrap_or_else(|| ".".into()));

    match cli.command {
        Command::Init(args) => cmd_init(&repo_root, args),
        Command::Clone(args) => cmd_clone(&repo_root, args),
        Command::Import(args) => cmd_import(args),
        Command::Checkout(args) => cmd_checkout(&repo_root, args),
        Command::Switch(args) => cmd_switch(&repo_root, args),
        Command::Restore(args) => cmd_restore(&repo_root, args),
        Command::Reset(args) => cmd_reset(&repo_root, args),
        Command::Status(args) => cmd_status(&repo_root, args),
        Command::Diff(args) => cmd_diff(&repo_root, args),
        Command::Commit(args) => cmd_commit(&repo_root, args),
        Command::Log(args) => cmd_log(&repo_root, args),
        Command::Show(args) => cmd_show(&repo_root, args),
        Command::Merge(args) => cmd_merge(&repo_root, args),
        Command::Conflicts(_) => cmd_conflicts(&repo_root),
        Command::Resolve(args) => cmd_resolve(&repo_root, args),
        Command::MergeAbort(_) => cmd_merge_abort(&repo_root),
        Command::Fsck(_) => cmd_fsck(&repo_root),
        Command::BuildAnnotations(args) => cmd_build_annotations(&repo_root, args),
        Command::LfsPlus(LfsCommand::LsFiles(args)) => cmd_lfs_ls_files(&repo_root, args),
    }
}

fn parse_oid(hex: &str) -> anyhow::Result<ObjectId> {
    ObjectId::from_hex(hex).map_err(|e| CliError { code: exit_code::INVALID_ARGUMENT, message: e.to_string() }.into())
}

fn cmd_init(repo_root: &PathBuf, args: InitArgs) -> anyhow::Result<()> {
    let path = args.path.map(PathBuf::from).unwrap_or_else(|| repo_root.clone());
    Repository::init(&path, args.bare)?;
    println!(
        "{} Initialized {}Kart repository in {}",
        "✓".green().bold(),
        if args.bare { "bare " } else { "" },
        path.display().to_string().bold()
    );
    Ok(())
}

fn cmd_clone(repo_root: &PathBuf, args: CloneArgs) -> anyhow::Result<()> {
    let path = args.path.map(PathBuf::from).unwrap_or_else(|| repo_root.clone());
    Repository::clone_from(&args.source, &path, args.bare)?;
    println!("{} Cloned into {}", "✓".green().bold(), path.display().to_string().bold());
    Ok(())
}

fn cmd_import(args: ImportArgs) -> anyhow::Result<()> {
    Err(CliError {
        code: exit_code::INVALID_OPERATION,
        message: format!(
            "no import driver available for {} (format/driver support is out of scope)",
            args.source
        ),
    }
    .into())
}

fn cmd_checkout(repo_root: &PathBuf, args: CheckoutArgs) -> anyhow::Result<()> {
    let mut repo = Repository::open(repo_root)?;
    repo.switch(&args.branch, args.force)?;
    println!("{} Checked out {}", "✓".green().bold(), args.branch.yellow());
    Ok(())
}

fn cmd_switch(repo_root: &PathBuf, args: SwitchArgs) -> anyhow::Result<()> {
    let mut repo = Repository::open(repo_root)?;
    if args.create {
        repo.create_branch(&args.branch, None)?;
    }
    repo.switch(&args.branch, args.force)?;
    println!("{} Switched to {}", "✓".green().bold(), args.branch.yellow());
    Ok(())
}

fn dataset_filter(datasets: &[String]) -> anyhow::Result<KeyFilter> {
    if datasets.is_empty() {
        return Ok(KeyFilter::MatchAll);
    }
    let mut map = BTreeMap::new();
    for name in datasets {
        let path = DatasetPath::new(name.clone())
            .map_err(|e| CliError { code: exit_code::INVALID_ARGUMENT, message: e.to_string() })?;
        map.insert(path, PartFilter::default());
    }
    Ok(KeyFilter::Datasets(map))
}

fn cmd_restore(repo_root: &PathBuf, args: RestoreArgs) -> anyhow::Result<()> {
    let mut repo = Repository::open(repo_root)?;
    let filter = dataset_filter(&args.datasets)?;
    let source = args.source.as_deref().map(parse_oid).transpose()?;
    repo.restore(&filter, source, args.force)?;
    println!("{} Restored", "✓".green().bold());
    Ok(())
}

fn cmd_reset(repo_root: &PathBuf, args: ResetArgs) -> anyhow::Result<()> {
    let mut repo = Repository::open(repo_root)?;
    let target = args.target.as_deref().map(parse_oid).transpose()?;
    repo.reset(target, args.force)?;
    println!("{} Reset", "✓".green().bold());
    Ok(())
}

fn print_diff_text(diff: &RepoDiff) {
    if diff.is_empty() {
        println!("No changes.");
        return;
    }
    for (path, dataset_diff) in diff {
        println!("{}", path.as_str().bold());
        for delta in &dataset_diff.meta {
            println!("  meta {}", describe_delta(delta));
        }
        for delta in &dataset_diff.feature {
            println!("  feature {}", describe_delta(delta));
        }
        for delta in &dataset_diff.tile {
            println!("  tile {}", describe_delta(delta));
        }
    }
}

fn describe_delta(delta: &kart_diff::Delta) -> String {
    match (&delta.old_key, &delta.new_key) {
        (None, Some(k)) => format!("{} {}", "+".green(), k),
        (Some(k), None) => format!("{} {}", "-".red(), k),
        (Some(_), Some(n)) => format!("{} {}", "~".yellow(), n),
        (None, None) => unreachable!(),
    }
}

fn diff_to_json(diff: &RepoDiff) -> serde_json::Value {
    let mut datasets = serde_json::Map::new();
    for (path, dataset_diff) in diff {
        datasets.insert(
            path.as_str().to_string(),
            serde_json::json!({
                "meta": dataset_diff.meta.len(),
                "feature": {
                    "insert": dataset_diff.feature.iter().filter(|d| d.old_key.is_none()).count(),
                    "update": dataset_diff.feature.iter().filter(|d| d.old_key.is_some() && d.new_key.is_some()).count(),
                    "delete": dataset_diff.feature.iter().filter(|d| d.new_key.is_none()).count(),
                },
                "tile": dataset_diff.tile.len(),
            }),
        );
    }
    serde_json::Value::Object(datasets)
}

fn cmd_diff(repo_root: &PathBuf, args: DiffArgs) -> anyhow::Result<()> {
    let repo = Repository::open(repo_root)?;
    let filter = KeyFilter::MatchAll;

    let diff = match (&args.old, &args.new) {
        (None, None) => repo.diff_working_copy(&filter)?,
        (Some(old), None) => {
            let commit = parse_oid(old)?;
            let info = repo.show(commit)?;
            let parent = info.parent_ids.first().copied();
            repo.diff_commits(parent, commit, &filter)?
        }
        (Some(old), Some(new)) => repo.diff_commits(Some(parse_oid(old)?), parse_oid(new)?, &filter)?,
        (None, Some(_)) => unreachable!("clap requires old before new"),
    };

    match args.output {
        OutputFormat::Text => print_diff_text(&diff),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&diff_to_json(&diff))?),
        OutputFormat::Geojson => println!("{}", serde_json::to_string_pretty(&diff_to_geojson(&diff))?),
        OutputFormat::Html => println!("{}", diff_to_html(&diff)),
    }
    Ok(())
}

/// A best-effort `FeatureCollection`: geometry columns are carried as raw
/// WKB hex rather than parsed GeoJSON geometry, since this crate has no WKB
/// parser -- properties are still fully decoded.
fn diff_to_geojson(diff: &RepoDiff) -> serde_json::Value {
    let mut features = Vec::new();
    for (path, dataset_diff) in diff {
        for delta in &dataset_diff.feature {
            let mut properties = serde_json::Map::new();
            properties.insert("dataset".into(), serde_json::Value::String(path.as_str().to_string()));
            properties.insert(
                "change".into(),
                serde_json::Value::String(format!("{:?}", delta.kind()).to_lowercase()),
            );
            properties.insert("key".into(), serde_json::Value::String(delta.new_key.clone().or_else(|| delta.old_key.clone()).unwrap_or_default()));
            features.push(serde_json::json!({
                "type": "Feature",
                "geometry": null,
                "properties": properties,
            }));
        }
    }
    serde_json::json!({ "type": "FeatureCollection", "features": features })
}

fn diff_to_html(diff: &RepoDiff) -> String {
    let mut out = String::from("<table><tr><th>dataset</th><th>part</th><th>change</th></tr>");
    for (path, dataset_diff) in diff {
        for delta in dataset_diff.meta.iter().chain(&dataset_diff.feature).chain(&dataset_diff.tile) {
            out.push_str(&format!(
                "<tr><td>{}</td><td>{:?}</td></tr>",
                path.as_str(),
                delta.kind()
            ));
        }
    }
    out.push_str("</table>");
    out
}

fn cmd_commit(repo_root: &PathBuf, args: CommitArgs) -> anyhow::Result<()> {
    let mut repo = Repository::open(repo_root)?;
    let result = repo.commit(kart_repo::CommitProposal::new(args.message))?;
    println!("{} Committed {}", "✓".green().bold(), result.commit_id.to_hex()[..12].yellow());
    Ok(())
}

fn cmd_log(repo_root: &PathBuf, args: LogArgs) -> anyhow::Result<()> {
    let repo = Repository::open(repo_root)?;
    let from = args.from.as_deref().map(parse_oid).transpose()?;
    for commit_id in repo.log(from)? {
        let info = repo.show(commit_id)?;
        println!("{} {}", commit_id.to_hex()[..12].yellow().bold(), info.message.lines().next().unwrap_or(""));
    }
    Ok(())
}

fn cmd_show(repo_root: &PathBuf, args: ShowArgs) -> anyhow::Result<()> {
    let repo = Repository::open(repo_root)?;
    let commit_id = parse_oid(&args.commit)?;
    let info = repo.show(commit_id)?;
    println!("commit {}", commit_id.to_hex().yellow().bold());
    println!("Author: {} <{}>", info.author_name, info.author_email);
    println!("Tree:   {}", info.tree_id.to_hex());
    println!();
    println!("    {}", info.message);
    Ok(())
}

fn cmd_merge(repo_root: &PathBuf, args: MergeArgs) -> anyhow::Result<()> {
    let mut repo = Repository::open(repo_root)?;
    let ff = if args.ff_only {
        FastForwardMode::Only
    } else if args.no_ff {
        FastForwardMode::Never
    } else {
        FastForwardMode::Auto
    };
    match repo.merge_start(&args.branch, ff)? {
        MergeOutcome::UpToDate => println!("Already up to date."),
        MergeOutcome::FastForward { commit, .. } => {
            println!("{} Fast-forwarded to {}", "✓".green().bold(), commit.to_hex()[..12].yellow());
        }
        MergeOutcome::Resolved { index } => {
            if index.is_fully_resolved() {
                let message = args.message.unwrap_or_else(|| format!("Merge branch '{}'", args.branch));
                let result = repo.merge_finalise(kart_repo::CommitProposal::new(message))?;
                println!("{} Merged into {}", "✓".green().bold(), result.commit_id.to_hex()[..12].yellow());
            } else {
                println!(
                    "{} {} conflict(s); resolve them and run `kart merge-abort` or commit the merge.",
                    "!".red().bold(),
                    index.unresolved_keys().len()
                );
            }
        }
    }
    Ok(())
}

fn cmd_conflicts(repo_root: &PathBuf) -> anyhow::Result<()> {
    let repo = Repository::open(repo_root)?;
    for (key, category) in repo.conflicts()? {
        println!("{}  {:?}", key.yellow(), category);
    }
    Ok(())
}

fn cmd_resolve(repo_root: &PathBuf, args: ResolveArgs) -> anyhow::Result<()> {
    let mut repo = Repository::open(repo_root)?;
    let resolve = if args.delete {
        Resolve::Delete
    } else if let Some(path) = &args.with {
        let data = std::fs::read(path)?;
        let id = repo.store().write_blob(&data)?;
        Resolve::Merged(kart_merge::ConflictEntry {
            path: args.key.clone(),
            id,
            mode: kart_merge::Mode::Blob,
        })
    } else if args.ancestor || args.ours || args.theirs {
        let sides = repo.conflict_entry(&args.key)?;
        let picked = if args.ancestor {
            sides.ancestor
        } else if args.ours {
            sides.ours
        } else {
            sides.theirs
        };
        match picked {
            Some(entry) => Resolve::Merged(entry),
            None => Resolve::Delete,
        }
    } else {
        return Err(CliError {
            code: exit_code::INVALID_ARGUMENT,
            message: "resolve requires one of --ancestor, --ours, --theirs, --delete or --with=<file>".into(),
        }
        .into());
    };
    repo.merge_resolve(&args.key, resolve)?;
    println!("{} Resolved {}", "✓".green().bold(), args.key.yellow());
    Ok(())
}

fn cmd_merge_abort(repo_root: &PathBuf) -> anyhow::Result<()> {
    let mut repo = Repository::open(repo_root)?;
    repo.merge_abort()?;
    println!("{} Merge aborted", "✓".green().bold());
    Ok(())
}

fn cmd_fsck(repo_root: &PathBuf) -> anyhow::Result<()> {
    let repo = Repository::open(repo_root)?;
    let report = repo.fsck()?;
    if report.is_clean() {
        println!("{} No issues.", "✓".green().bold());
        return Ok(());
    }
    for path in &report.feature_path_errors {
        println!("{} unreadable feature path: {}", "!".red(), path);
    }
    for path in &report.tile_integrity_errors {
        println!("{} tile content mismatch: {}", "!".red(), path);
    }
    for path in &report.working_copy_mismatches {
        println!("{} working copy drift: {}", "!".red(), path);
    }
    Err(CliError {
        code: exit_code::GENERIC_FAILURE,
        message: "fsck found issues".into(),
    }
    .into())
}

fn cmd_build_annotations(repo_root: &PathBuf, args: BuildAnnotationsArgs) -> anyhow::Result<()> {
    let repo = Repository::open(repo_root)?;
    let built = repo.build_annotations(args.all_reachable)?;
    println!("{} Built {} annotation(s)", "✓".green().bold(), built);
    Ok(())
}

fn cmd_lfs_ls_files(repo_root: &PathBuf, args: LsFilesArgs) -> anyhow::Result<()> {
    let repo = Repository::open(repo_root)?;
    let range = if args.all {
        let commits = repo.log(None)?;
        kart_lfs::TreeRange::All(
            commits
                .into_iter()
                .map(|c| repo.show(c).map(|info| info.tree_id))
                .collect::<Result<Vec<_>, _>>()?,
        )
    } else if let Some(spec) = &args.range {
        match spec.split_once("..") {
            Some((from, to)) => kart_lfs::TreeRange::Range(parse_oid(from)?, parse_oid(to)?),
            None => kart_lfs::TreeRange::Single(parse_oid(spec)?),
        }
    } else {
        let head = repo.head_tree()?.ok_or(kart_repo::RepoError::NoCommit)?;
        kart_lfs::TreeRange::Single(head)
    };

    for record in repo.lfs_ls_files(range)? {
        println!("{}  {:>10}  {}", record.oid.to_hex(), record.size, record.path);
    }
    Ok(())
}
