use std::thread;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use minesweeper_ai::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing_subscriber::EnvFilter;

/// Autonomous minesweeper bot: plays logically safe moves, guesses otherwise.
#[derive(Parser)]
#[command(name = "minesweeper-ai")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Board height
    #[arg(long, default_value_t = 8)]
    height: usize,

    /// Board width
    #[arg(long, default_value_t = 8)]
    width: usize,

    /// Number of mines
    #[arg(long, default_value_t = 8)]
    mines: usize,

    /// Seed for reproducible boards and guesses
    #[arg(long)]
    seed: Option<u64>,

    /// Reasoning strategy
    #[arg(long, value_enum, default_value_t = StrategyKind::Kb)]
    strategy: StrategyKind,

    /// Number of games to play
    #[arg(long, default_value_t = 1)]
    games: usize,

    /// Pause between moves, in milliseconds
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Don't print the board after each move
    #[arg(long)]
    quiet: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyKind {
    /// Constraint resolution over a knowledge base
    Kb,
    /// Exhaustive SAT analysis
    Sat,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut wins = 0;
    for number in 1..=cli.games {
        println!("--- Game #{number} ---");
        let field = Minefield::random(cli.height, cli.width, cli.mines, &mut rng)?;
        let state = match cli.strategy {
            StrategyKind::Kb => {
                let agent = KnowledgeEngine::new(cli.height, cli.width);
                run_game(Game::with_agent(field, agent)?, &cli, &mut rng)?
            }
            StrategyKind::Sat => {
                let agent = SatOracle::new(cli.height, cli.width);
                run_game(Game::with_agent(field, agent)?, &cli, &mut rng)?
            }
        };
        if state == GameState::Won {
            wins += 1;
        }
    }

    println!("\nWon {wins} of {} games", cli.games);
    Ok(())
}

fn run_game<S: Strategy>(
    mut game: Game<S>,
    cli: &Cli,
    rng: &mut StdRng,
) -> anyhow::Result<GameState> {
    if !cli.quiet {
        println!("{game}");
    }

    let mut move_count = 0;
    while game.game_state == GameState::Playing {
        let Some(mv) = game.step(rng)? else {
            println!("No valid moves left for the bot to make.");
            break;
        };
        move_count += 1;

        match mv.kind {
            MoveKind::Safe => println!("Move #{move_count}: safe reveal {}", mv.cell),
            MoveKind::Guess => println!("Move #{move_count}: guess {}", mv.cell),
        }
        if !cli.quiet {
            println!("{game}");
        }

        if cli.delay_ms > 0 {
            thread::sleep(Duration::from_millis(cli.delay_ms));
        }
    }

    match game.game_state {
        GameState::Won => println!("Result: The bot won!"),
        GameState::Lost => println!("Result: The bot hit a mine and lost."),
        GameState::Playing => println!("Result: The game ended unexpectedly."),
    }

    Ok(game.game_state)
}
