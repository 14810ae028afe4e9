use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use trader_sim_engine::config::SessionConfig;
use trader_sim_engine::logging::init_logging;
use trader_sim_engine::session::{SessionState, SessionView};
use trader_sim_engine::sim::run_batch;

#[derive(Parser)]
#[command(name = "trader-sim", about = "Terminal driver for the trading simulation engine")]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Args)]
struct BoardArgs {
	/// Built-in profile: classic or arcade
	#[arg(long, default_value = "classic")]
	profile: String,
	/// TOML config file; overrides --profile
	#[arg(long)]
	config: Option<String>,
	#[arg(long)]
	seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
	/// Interactive session on stdin
	Play {
		#[command(flatten)]
		board: BoardArgs,
	},
	/// Run the market unattended and print the final board
	Run {
		#[command(flatten)]
		board: BoardArgs,
		#[arg(long, default_value_t = 100)]
		ticks: usize,
		/// Sleep between ticks; 0 runs flat out
		#[arg(long, default_value_t = 0)]
		interval_ms: u64,
		#[arg(long)]
		json: bool,
	},
	/// Many seeded sessions in parallel, summarized per asset
	Batch {
		#[command(flatten)]
		board: BoardArgs,
		#[arg(long, default_value_t = 100)]
		sessions: usize,
		#[arg(long, default_value_t = 500)]
		ticks: usize,
		#[arg(long, default_value_t = 0)]
		seed_start: u64,
	},
	/// Parse and validate a config file
	Validate {
		config: String,
	},
}

fn main() -> Result<()> {
	init_logging();
	let cli = Cli::parse();
	match cli.command {
		Commands::Play { board } => play_cmd(&board),
		Commands::Run {
			board,
			ticks,
			interval_ms,
			json,
		} => run_cmd(&board, ticks, interval_ms, json),
		Commands::Batch {
			board,
			sessions,
			ticks,
			seed_start,
		} => batch_cmd(&board, sessions, ticks, seed_start),
		Commands::Validate { config } => {
			let cfg = SessionConfig::load(&config)?;
			println!(
				"[PASS] {}: {} assets, {} fixed-income instruments",
				config,
				cfg.assets.len(),
				cfg.fixed_income.len()
			);
			Ok(())
		}
	}
}

fn load_board(args: &BoardArgs) -> Result<SessionConfig> {
	let mut cfg = match &args.config {
		Some(path) => SessionConfig::load(path)?,
		None => SessionConfig::profile(&args.profile)?,
	};
	if let Some(seed) = args.seed {
		cfg.seed = seed;
	}
	Ok(cfg)
}

fn run_cmd(args: &BoardArgs, ticks: usize, interval_ms: u64, json: bool) -> Result<()> {
	let mut session = SessionState::initialize(load_board(args)?)?;
	session.start();
	for _ in 0..ticks {
		session.tick();
		if interval_ms > 0 {
			thread::sleep(Duration::from_millis(interval_ms));
		}
	}

	if json {
		println!("{}", serde_json::to_string_pretty(&session.view())?);
	} else {
		print_board(&session.view());
	}
	Ok(())
}

fn batch_cmd(args: &BoardArgs, sessions: usize, ticks: usize, seed_start: u64) -> Result<()> {
	if sessions == 0 {
		bail!("--sessions must be at least 1");
	}
	let cfg = load_board(args)?;
	let report = run_batch(&cfg, sessions, ticks, seed_start)?;

	println!("\nAsset            Initial    Mean Final     Std Final    Min Final    Max Final   Mean Ret%");
	println!("---------------------------------------------------------------------------------------------");
	for a in &report.assets {
		println!(
			"{:<14} {:>10.2} {:>13.2} {:>13.2} {:>12.2} {:>12.2} {:>10.2}",
			a.asset,
			a.initial_price,
			a.mean_final,
			a.std_final,
			a.min_final,
			a.max_final,
			a.mean_return * 100.0
		);
	}
	println!("\n{} sessions x {} ticks, {:.2} news events per session", report.sessions, report.ticks, report.mean_events);
	Ok(())
}

fn play_cmd(args: &BoardArgs) -> Result<()> {
	let mut session = SessionState::initialize(load_board(args)?)?;
	println!("{}", session.news());
	println!("commands: start | stop | tick [n] | buy ASSET QTY | sell ASSET QTY | deposit NAME AMT | withdraw NAME AMT | show | json | reset | quit");

	let stdin = io::stdin();
	let mut out = io::stdout();
	loop {
		write!(out, "> ")?;
		out.flush()?;

		let mut line = String::new();
		if stdin.lock().read_line(&mut line)? == 0 {
			break;
		}
		let words: Vec<&str> = line.split_whitespace().collect();
		let Some((&cmd, rest)) = words.split_first() else {
			continue;
		};

		match cmd {
			"quit" | "exit" => break,
			"start" => session.start(),
			"stop" => session.stop(),
			"reset" => session.reset(),
			"show" => print_board(&session.view()),
			"json" => println!("{}", serde_json::to_string_pretty(&session.view())?),
			"tick" => {
				let n: usize = match rest.first().map(|n| n.parse()) {
					Some(Ok(n)) => n,
					Some(Err(_)) => {
						println!("tick count must be an integer");
						continue;
					}
					None => 1,
				};
				if !session.is_running() {
					println!("market is stopped; type 'start' first");
					continue;
				}
				for _ in 0..n {
					if let Some(report) = session.tick() {
						if let Some(news) = report.news {
							println!("[tick {}] {}", report.tick, news);
						}
					}
				}
			}
			"buy" | "sell" | "deposit" | "withdraw" => match parse_target(rest) {
				Some((name, amount)) => {
					let outcome = match cmd {
						"buy" => session.buy(&name, amount).map(|r| format!("bought {} {} for {:.2}", r.quantity, r.asset, -r.cash_delta())),
						"sell" => session.sell(&name, amount).map(|r| format!("sold {} {} for {:.2}", r.quantity, r.asset, r.cash_delta())),
						"deposit" => session.deposit(&name, amount).map(|_| format!("deposited {amount:.2} into {name}")),
						_ => session.withdraw(&name, amount).map(|_| format!("withdrew {amount:.2} from {name}")),
					};
					match outcome {
						Ok(msg) => println!("{msg}"),
						Err(e) => println!("rejected: {e}"),
					}
				}
				None => println!("usage: {cmd} NAME AMOUNT"),
			},
			other => println!("unknown command '{other}'"),
		}
	}
	Ok(())
}

/// Split "OURO (1g) 2.5" into ("OURO (1g)", 2.5); names may contain spaces.
fn parse_target(words: &[&str]) -> Option<(String, f64)> {
	let (amount, name) = words.split_last()?;
	if name.is_empty() {
		return None;
	}
	let amount: f64 = amount.parse().ok()?;
	Some((name.join(" "), amount))
}

fn print_board(view: &SessionView) {
	println!("\nTick {}  |  cycle {}/{}  |  {}", view.tick, view.cycle, view.period, if view.running { "running" } else { "stopped" });
	println!("News: {}", view.news);
	println!("Cash {:.2}  |  Equity {:.2}  |  Realized {:.2}\n", view.cash, view.total_equity, view.realized_pnl);

	println!("{:<14} {:>14} {:>10}", "Asset", "Price", "Delta");
	for q in &view.quotes {
		println!("{:<14} {:>14.2} {:>+10.2}", q.asset, q.price, q.delta);
	}

	if !view.positions.is_empty() {
		println!("\n{:<14} {:>10} {:>12} {:>12} {:>12}", "Position", "Qty", "Avg Cost", "Price", "P&L");
		for p in &view.positions {
			println!(
				"{:<14} {:>10.2} {:>12.2} {:>12.2} {:>+12.2}",
				p.asset, p.quantity, p.average_cost, p.price, p.unrealized_pnl
			);
		}
	}

	let deposits: Vec<_> = view.deposits.iter().filter(|d| d.balance > 0.0).collect();
	if !deposits.is_empty() {
		println!("\n{:<14} {:>12} {:>14}", "Deposit", "Yield", "Balance");
		for d in deposits {
			println!("{:<14} {:>12} {:>14.2}", d.instrument, d.label, d.balance);
		}
	}
}
