use cascade_ssg::config::{self, BuildConfig};
use cascade_ssg::output;
use cascade_ssg::pipeline::Pipeline;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Flags shared by building and checking.
#[derive(Args, Clone)]
struct BuildArgs {
    /// Public base URL the site is served from, e.g. https://example.com
    ///
    /// Rooted links are prefixed with it. Omit to serve from the root.
    site_url: Option<String>,

    /// Project root containing config.toml and the source directory
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Config file to use instead of <root>/config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log every stage and file decision
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser)]
#[command(name = "cascade-ssg")]
#[command(about = "Static site generator with cascading frontmatter defaults")]
#[command(long_about = "\
Static site generator with cascading frontmatter defaults

Every file under the source directory is loaded, enriched with metadata,
rendered and written to the destination in one pass. Frontmatter always
wins over configured defaults; directories with an index page form the
navigation tree.

Project structure:

  site/
  ├── config.toml          # Optional, see 'cascade-ssg gen-config'
  └── src/
      ├── index.md         # Home page (/)
      ├── contact.md       # /contact.html
      ├── about/
      │   ├── index.md     # /about/
      │   └── team.md      # /about/team.html
      └── error/404.md     # Hidden from navigation by default

Run 'cascade-ssg https://example.com' to build with absolute links, or
'cascade-ssg check' to run every stage without writing anything.")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(flatten)]
    build: BuildArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline without writing output
    Check(BuildArgs),
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        None => {
            let build_config = prepare(&cli.build)?;
            println!(
                "==> Building {} → {}",
                build_config.source.display(),
                build_config.destination.display()
            );
            let outcome = Pipeline::standard(&build_config).build(&build_config)?;
            output::print_build_output(&outcome, Some(&build_config.destination));
        }
        Some(Command::Check(args)) => {
            let build_config = prepare(&args)?;
            println!("==> Checking {}", build_config.source.display());
            let outcome = Pipeline::standard(&build_config).check(&build_config)?;
            output::print_build_output(&outcome, None);
            println!("==> Site is valid");
        }
        Some(Command::GenConfig) => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Set up logging, load and compile config, size the thread pool.
fn prepare(args: &BuildArgs) -> Result<BuildConfig, config::ConfigError> {
    init_logging(args.verbose);
    let site = match &args.config {
        Some(path) => config::load_config_file(path)?,
        None => config::load_config(&args.root)?,
    };
    let build_config = site.compile(&args.root, args.site_url.as_deref().unwrap_or(""))?;
    init_thread_pool(build_config.threads);
    Ok(build_config)
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Initialize the rayon thread pool with the configured thread count.
fn init_thread_pool(threads: usize) {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
