//! cashdesk-runner: headless runner for the receivables risk engine.
//!
//! Usage:
//!   cashdesk-runner --data data/receivables.json --as-of 2026-06-30 --db ledger.db --cash 250000
//!   cashdesk-runner --data data/receivables.json --ipc-mode

use anyhow::Result;
use cashdesk_core::{
    arbiter::ArbitrationRequest,
    config::EngineConfig,
    engine::{AsOf, RiskEngine},
    governance::{DecisionKind, GovernanceLedger, OutcomeKind},
    narrative,
    portfolio::CashPosition,
    source::JsonFileSource,
    stress::StressRequest,
};
use chrono::NaiveDate;
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    EvaluateTrigger,
    RunCycle {
        #[serde(default)]
        reason: Option<String>,
    },
    Validate {
        action_id: String,
        decision: DecisionKind,
        actor: String,
        #[serde(default)]
        comment: Option<String>,
    },
    RecordOutcome {
        action_id: String,
        outcome: OutcomeKind,
        #[serde(default)]
        recovered_amount: Option<f64>,
        #[serde(default)]
        notes: Option<String>,
    },
    Stress {
        request: StressRequest,
    },
    Arbitrate {
        request: ArbitrationRequest,
    },
    Metrics,
    State,
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let data = arg_str(&args, "--data").unwrap_or("./data/receivables.json");
    let data_dir = arg_str(&args, "--data-dir").unwrap_or("./data");
    let db = arg_str(&args, "--db").unwrap_or(":memory:");
    let cash = parse_arg(&args, "--cash", f64::NAN);
    let inflow = parse_arg(&args, "--inflow", 0.0f64);
    let outflow = parse_arg(&args, "--outflow", 0.0f64);
    let as_of = match arg_str(&args, "--as-of") {
        Some(s) => AsOf::Fixed(NaiveDate::parse_from_str(s, "%Y-%m-%d")?),
        None => AsOf::Today,
    };

    let config = match EngineConfig::load(data_dir) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("{e}; using built-in defaults");
            EngineConfig::default()
        }
    };

    if !ipc_mode {
        println!("cashdesk-runner");
        println!("  data:      {data}");
        println!("  db:        {db}");
        println!("  as_of:     {}", as_of.resolve());
        println!();
    }

    let ledger = if db == ":memory:" {
        GovernanceLedger::in_memory()?
    } else {
        GovernanceLedger::open(db)?
    };
    let mut engine = RiskEngine::build(config, Box::new(JsonFileSource::new(data)), ledger)?.with_as_of(as_of);
    if cash.is_finite() {
        engine.set_cash_position(Some(CashPosition {
            current_cash: cash,
            monthly_inflow: inflow,
            monthly_outflow: outflow,
        }));
    }

    if ipc_mode {
        run_ipc_loop(&mut engine)?;
    } else {
        run_once(&mut engine)?;
    }
    engine.shutdown();
    Ok(())
}

fn run_once(engine: &mut RiskEngine) -> Result<()> {
    let (fired, reason) = engine.evaluate_trigger();
    println!("=== TRIGGER ===");
    println!("  fired:  {fired}");
    println!("  reason: {reason}");
    if !fired {
        return Ok(());
    }

    let result = engine.run_analysis_cycle(&reason)?;
    println!();
    println!("=== CYCLE {} ===", result.cycle_id);
    for finding in &result.findings {
        println!("  {finding}");
    }
    println!();
    println!("=== ACTIONS ===");
    if result.actions.is_empty() {
        println!("  (none proposed)");
    }
    for a in &result.actions {
        println!(
            "  {:?} {} | {} | impact {:.0} | score {:.1} | due {}",
            a.tier, a.action_id, a.title, a.impact_amount, a.priority_score, a.deadline
        );
    }
    println!();
    println!("  state: {}", engine.state());
    println!();
    println!("{}", narrative::governance_summary(&engine.get_governance_metrics()?));
    Ok(())
}

fn run_ipc_loop(engine: &mut RiskEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                writeln!(stdout, "{}", serde_json::json!({ "error": e.to_string() }))?;
                stdout.flush()?;
                continue;
            }
        };
        if matches!(cmd, IpcCommand::Quit) {
            break;
        }

        let response = match handle_command(engine, cmd) {
            Ok(value) => value,
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        };
        writeln!(stdout, "{response}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(engine: &mut RiskEngine, cmd: IpcCommand) -> Result<serde_json::Value> {
    let value = match cmd {
        IpcCommand::EvaluateTrigger => {
            let decision = engine.trigger_decision();
            serde_json::to_value(decision)?
        }
        IpcCommand::RunCycle { reason } => {
            let reason = match reason {
                Some(r) => r,
                None => {
                    let (fired, reason) = engine.evaluate_trigger();
                    if !fired {
                        return Ok(serde_json::json!({ "skipped": true, "reason": reason }));
                    }
                    reason
                }
            };
            serde_json::to_value(engine.run_analysis_cycle(&reason)?)?
        }
        IpcCommand::Validate { action_id, decision, actor, comment } => {
            serde_json::to_value(engine.record_validation(&action_id, decision, &actor, comment.as_deref())?)?
        }
        IpcCommand::RecordOutcome { action_id, outcome, recovered_amount, notes } => {
            let id = engine.record_outcome(&action_id, outcome, recovered_amount, notes.as_deref())?;
            serde_json::json!({ "outcome_id": id })
        }
        IpcCommand::Stress { request } => {
            let result = engine.run_stress_test(&request)?;
            serde_json::json!({ "summary": narrative::stress_summary(&result), "result": result })
        }
        IpcCommand::Arbitrate { request } => {
            let result = engine.arbitrate(&request);
            serde_json::json!({ "summary": narrative::arbitration_summary(&result), "result": result })
        }
        IpcCommand::Metrics => serde_json::to_value(engine.get_governance_metrics()?)?,
        IpcCommand::State => serde_json::to_value(engine.snapshot())?,
        IpcCommand::Quit => serde_json::Value::Null,
    };
    Ok(value)
}

fn arg_str<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
