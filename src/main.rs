use std::path::PathBuf;

use clap::{Parser, Subcommand};

use gist::api::GithubClient;
use gist::cache::{JsonFileCache, PageCache};
use gist::editor::CommandEditor;
use gist::index::PageIndex;
use gist::mirror::GitMirrors;
use gist::publish::{EditOutcome, Publisher};
use gist::view::find_file;
use gist::{Config, NewPage};

#[derive(Parser)]
#[command(name = "gist", about = "Keep a local git mirror of your GitHub gists")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every file of every gist
    List,

    /// Print one file
    Cat {
        /// Gist id (or unique prefix)
        id: String,
        /// File name inside the gist
        file: String,
    },

    /// Edit a file and push the change
    Edit {
        /// Gist id (or unique prefix)
        id: String,
        /// File name inside the gist
        file: String,
    },

    /// Create a new gist from local files
    Create {
        /// Make the gist public
        #[arg(long)]
        public: bool,
        /// Gist description
        #[arg(short, long, default_value = "")]
        description: String,
        /// Files to upload
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Drop the cached listing and fetch it again
    Refresh,

    /// Check dependencies and configuration
    Doctor,
}

type Index<'a> = PageIndex<'a, JsonFileCache, GithubClient, GitMirrors>;

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match Config::from_env() {
        Ok(config) => run(cli.command, &config),
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::List => cmd_list(config),
        Commands::Cat { id, file } => cmd_cat(config, &id, &file),
        Commands::Edit { id, file } => cmd_edit(config, &id, &file),
        Commands::Create {
            public,
            description,
            paths,
        } => cmd_create(config, public, description, &paths),
        Commands::Refresh => cmd_refresh(config),
        Commands::Doctor => cmd_doctor(config),
    }
}

fn index(config: &Config) -> Index<'_> {
    PageIndex::new(
        config,
        JsonFileCache::new(&config.paths()),
        GithubClient::new(config.token.clone()),
        GitMirrors::new(),
    )
}

fn cmd_list(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let files = index(config).files()?;

    if files.is_empty() {
        println!("No gists found");
        return Ok(());
    }

    for file in files {
        println!(
            "{:<34} {:<30} {}",
            file.page.id,
            file.name,
            first_line(&file.page.description)
        );
    }

    Ok(())
}

fn cmd_cat(config: &Config, id: &str, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let files = index(config).files()?;
    let file = find_file(&files, id, name).ok_or_else(|| format!("no file {}/{}", id, name))?;
    print!("{}", file.content);
    Ok(())
}

fn cmd_edit(config: &Config, id: &str, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let index = index(config);
    let files = index.files()?;
    let file = find_file(&files, id, name).ok_or_else(|| format!("no file {}/{}", id, name))?;

    let publisher = Publisher::new(
        config,
        CommandEditor::new(config.editor.clone()),
        index.mirrors(),
        index.cache(),
    );
    match publisher.edit(file)? {
        EditOutcome::Pushed => println!("Pushed"),
        EditOutcome::Unchanged => println!("No changes"),
    }
    Ok(())
}

fn cmd_create(
    config: &Config,
    public: bool,
    description: String,
    paths: &[PathBuf],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| format!("invalid file name: {}", path.display()))?;
        let content = std::fs::read_to_string(path)?;
        files.push((name.to_string(), content));
    }

    let page = index(config).create(&NewPage {
        description,
        public,
        files,
    })?;
    println!("Created {}", page.id);
    Ok(())
}

fn cmd_refresh(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let pages = index(config).refresh()?;
    println!("Synced {} gists", pages.len());
    Ok(())
}

fn cmd_doctor(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("gist system check\n");

    let git_ok = GitMirrors::new().cli().is_available();
    println!(
        "[{}] git: {}",
        if git_ok { "OK" } else { "FAIL" },
        if git_ok { "available" } else { "not found" }
    );

    let dir_ok = config.work_dir().exists();
    println!(
        "[{}] Working dir: {}",
        if dir_ok { "OK" } else { "INFO" },
        config.work_dir().display()
    );

    let cache = JsonFileCache::new(&config.paths());
    let cached = cache.load().len();
    println!(
        "[{}] Cache: {} gists",
        if cached > 0 { "OK" } else { "INFO" },
        cached
    );

    println!(
        "[{}] GITHUB_TOKEN: {}",
        if config.token.is_some() { "OK" } else { "INFO" },
        if config.token.is_some() {
            "set"
        } else {
            "not set (private gists and push unavailable)"
        }
    );

    println!("[OK] Editor: {}", config.editor);

    if !git_ok {
        std::process::exit(1);
    }

    Ok(())
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("")
}
