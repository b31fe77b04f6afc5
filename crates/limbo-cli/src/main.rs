//! limbo CLI - GOAP scenario driver.
//!
//! - `limbo plan <scenario>` - search for a plan and print it
//! - `limbo simulate <scenario>` - run the plan through a behavior tree, tick by tick

mod scenario;

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use limbo_bt::{BehaviorTree, Sequence, SetVar, Wait};
use limbo_core::{BbParam, Status, Value};
use limbo_goap::{AgentCtx, GoapPlanner, RunGoapPlan};
use limbo_tools::{SharedTraceSink, TraceLog};

use crate::scenario::{symbolic, ActionSpec, FactValue, Scenario};

#[derive(Parser)]
#[command(name = "limbo")]
#[command(about = "Plan and simulate GOAP scenarios", version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for a plan from the scenario's facts to its goal
    Plan {
        scenario: PathBuf,

        /// Override the scenario's search budget
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Execute the plan with simulated action durations
    Simulate {
        scenario: PathBuf,

        /// Maximum number of ticks
        #[arg(long, default_value_t = 200)]
        ticks: u32,

        /// Seconds per tick
        #[arg(long, default_value_t = 0.1)]
        delta: f64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Plan {
            scenario,
            max_iterations,
            json,
        } => plan(&scenario, max_iterations, json),
        Commands::Simulate {
            scenario,
            ticks,
            delta,
        } => simulate(&scenario, ticks, delta),
    }
}

#[derive(Serialize)]
struct PlanReport {
    scenario: String,
    goal: String,
    steps: Vec<PlanStep>,
    total_cost: u64,
    iterations: usize,
    time_ms: f64,
}

#[derive(Serialize)]
struct PlanStep {
    action: String,
    cost: u32,
}

fn plan(path: &Path, max_iterations: Option<usize>, json: bool) -> Result<()> {
    let scenario = Scenario::load(path)?;
    tracing::info!(scenario = %scenario.name, actions = scenario.actions.len(), "planning");
    let mut config = scenario.planner;
    if let Some(max) = max_iterations {
        config = config.with_max_iterations(max);
    }

    let mut planner = GoapPlanner::new().with_config(config);
    let goal = scenario.goal();
    let steps = planner.plan(
        &scenario.actions(),
        &scenario.world_state(),
        &goal,
        &AgentCtx::default(),
    );

    let report = PlanReport {
        scenario: scenario.name.clone(),
        goal: goal.name.clone(),
        total_cost: steps.iter().map(|a| u64::from(a.base_cost())).sum(),
        steps: steps
            .iter()
            .map(|a| PlanStep {
                action: a.name().to_string(),
                cost: a.base_cost(),
            })
            .collect(),
        iterations: planner.last_iterations(),
        time_ms: planner.last_plan_time_ms(),
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to encode plan report")?
        );
        return Ok(());
    }

    println!("Scenario: {}", report.scenario);
    println!("Goal: {}", report.goal);
    if report.steps.is_empty() {
        if goal.is_satisfied(&scenario.world_state()) {
            println!("Goal already holds, nothing to do.");
        } else {
            println!("No plan found.");
        }
    } else {
        for (i, step) in report.steps.iter().enumerate() {
            println!("  {}. {} (cost {})", i + 1, step.action, step.cost);
        }
        println!("Total cost: {}", report.total_cost);
    }
    println!(
        "Search: {} iterations, {:.3} ms",
        report.iterations, report.time_ms
    );
    Ok(())
}

/// Waits out the action's duration, then writes its effects to the blackboard.
fn execution_tree(spec: &ActionSpec) -> Result<Rc<BehaviorTree>> {
    let mut bt = BehaviorTree::new().with_description(spec.name.clone());
    let root = bt.set_root_task(Sequence::new());
    let tasks = bt.tasks_mut();
    tasks
        .spawn(root, Wait::new(spec.duration))
        .with_context(|| format!("Failed to build tree for `{}`", spec.name))?;
    for (name, value) in &spec.effects {
        tasks
            .spawn(root, SetVar::new(name.clone(), BbParam::variant(Value::from(value))))
            .with_context(|| format!("Failed to build tree for `{}`", spec.name))?;
    }
    Ok(Rc::new(bt))
}

fn simulate(path: &Path, ticks: u32, delta: f64) -> Result<()> {
    if delta <= 0.0 {
        bail!("--delta must be positive");
    }
    let scenario = Scenario::load(path)?;
    tracing::info!(scenario = %scenario.name, ticks, delta, "starting simulation");

    let mut leaf = RunGoapPlan::new(scenario.goal()).with_config(
        scenario
            .run
            .with_max_iterations(scenario.planner.max_iterations),
    );
    for spec in &scenario.actions {
        leaf = leaf.with_action(symbolic(spec).with_execution_tree(execution_tree(spec)?));
    }
    let mut bt = BehaviorTree::new().with_description(scenario.name.clone());
    bt.set_root_task(leaf);

    let bb = scenario.blackboard();
    let mut instance = bt
        .instantiate(None, &bb, None)
        .context("Failed to instantiate the planning tree")?;
    let log = Rc::new(RefCell::new(TraceLog::default()));
    let sink: SharedTraceSink = log.clone();
    instance.set_trace_sink(Some(sink));

    let mut status = Status::Running;
    let mut elapsed_ticks = 0;
    while elapsed_ticks < ticks && status == Status::Running {
        status = instance.update(delta);
        elapsed_ticks += 1;
    }

    println!("Scenario: {}", scenario.name);
    for event in log.borrow().events.iter() {
        let label = event.label.as_deref().unwrap_or_default();
        match &*event.tag {
            "goap.replan" => println!(
                "[tick {:>4}] replan: {} steps in {} iterations",
                event.tick, event.a, event.b
            ),
            "goap.action" => println!("[tick {:>4}] start {}", event.tick, label),
            "goap.fallback" => println!("[tick {:>4}] fallback for {}", event.tick, label),
            _ => {}
        }
    }
    println!(
        "Result: {} after {} ticks ({:.2}s)",
        status_label(status),
        elapsed_ticks,
        f64::from(elapsed_ticks) * delta
    );
    println!("Final facts:");
    for (name, value) in bb.get_vars_as_map() {
        let shown = serde_json::to_string(&FactValue::from_value(&value))
            .context("Failed to encode fact")?;
        println!("  {name}: {shown}");
    }
    Ok(())
}

fn status_label(status: Status) -> &'static str {
    match status {
        Status::Fresh => "fresh",
        Status::Running => "still running",
        Status::Failure => "failure",
        Status::Success => "success",
    }
}
