use std::io::Write;

use anyhow::Context;
use chrono::Datelike;
use tracing::{debug, info, instrument};

use crate::calendar::{build_grid, shift_month};
use crate::cli::Invocation;
use crate::config::Config;
use crate::dashboard::{
    AnalyticsPeriod, analytics_series, build_dashboard, category_breakdown, summary_stats,
    today_tasks,
};
use crate::datastore::DataStore;
use crate::datetime::{Clock, parse_date_expr, parse_month_name};
use crate::error::DashError;
use crate::filter::{DEFAULT_PER_PAGE, ListQuery};
use crate::relative::format_relative_str;
use crate::render::Renderer;
use crate::task::{Task, validate_priority};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "dashboard",
        "calendar",
        "ago",
        "list",
        "today",
        "add",
        "toggle",
        "summary",
        "analytics",
        "categories",
        "show",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip_all)]
pub fn dispatch<W: Write>(
    store: &mut DataStore,
    cfg: &Config,
    renderer: &Renderer,
    inv: Invocation,
    clock: &Clock,
    out: &mut W,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();

    debug!(
        command,
        filter = ?inv.filter_terms,
        args = ?inv.command_args,
        today = %clock.today,
        "dispatching command"
    );

    match command {
        "dashboard" => cmd_dashboard(store, cfg, renderer, &inv.filter_terms, clock, out),
        "calendar" => cmd_calendar(renderer, &inv.command_args, clock, out),
        "ago" => cmd_ago(renderer, &inv.command_args, clock, out),
        "list" => cmd_list(store, cfg, renderer, &inv.filter_terms, &inv.command_args, clock, out),
        "today" => cmd_today(store, cfg, renderer, &inv.filter_terms, clock, out),
        "add" => cmd_add(store, renderer, &inv.command_args, clock, out),
        "toggle" => cmd_toggle(store, renderer, &inv.command_args, clock, out),
        "summary" => cmd_summary(store, cfg, renderer, &inv.filter_terms, clock, out),
        "analytics" => cmd_analytics(
            store,
            cfg,
            renderer,
            &inv.filter_terms,
            &inv.command_args,
            clock,
            out,
        ),
        "categories" => cmd_categories(store, cfg, renderer, &inv.filter_terms, clock, out),
        "show" => cmd_show(cfg, out),
        "help" => cmd_help(out),
        "version" => {
            writeln!(out, "duedash {}", env!("CARGO_PKG_VERSION"))?;
            Ok(())
        }
        other => Err(DashError::invalid(format!("unknown command: {other}")).into()),
    }
}

fn per_page(cfg: &Config) -> anyhow::Result<usize> {
    Ok(cfg.get_usize("list.per_page")?.unwrap_or(DEFAULT_PER_PAGE))
}

fn configured_period(cfg: &Config) -> anyhow::Result<AnalyticsPeriod> {
    let raw = cfg.get("analytics.period").unwrap_or("week");
    Ok(raw.parse::<AnalyticsPeriod>()?)
}

/// Loads tasks narrowed by the filter terms given before the command word.
fn load_selected(
    store: &DataStore,
    cfg: &Config,
    filter_terms: &[String],
    clock: &Clock,
) -> anyhow::Result<Vec<Task>> {
    let tasks = store.load_tasks()?;
    if filter_terms.is_empty() {
        return Ok(tasks);
    }

    let query = ListQuery::parse(filter_terms, clock.today, per_page(cfg)?)?;
    let selected: Vec<Task> = tasks.into_iter().filter(|t| query.matches(t)).collect();
    debug!(count = selected.len(), "applied filter terms");
    Ok(selected)
}

#[instrument(skip_all)]
fn cmd_dashboard<W: Write>(
    store: &DataStore,
    cfg: &Config,
    renderer: &Renderer,
    filter_terms: &[String],
    clock: &Clock,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command dashboard");
    let tasks = load_selected(store, cfg, filter_terms, clock)?;
    let view = build_dashboard(&tasks, clock, configured_period(cfg)?)?;
    renderer.dashboard(out, &view)
}

#[instrument(skip_all)]
fn cmd_calendar<W: Write>(
    renderer: &Renderer,
    args: &[String],
    clock: &Clock,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command calendar");
    let (month, year) = resolve_calendar_target(args, clock)?;
    let grid = build_grid(month, year, clock.today)?;
    renderer.calendar(out, &grid)
}

/// Resolves `[MONTH] [YEAR]` to a zero-based month and year.
fn resolve_calendar_target(args: &[String], clock: &Clock) -> Result<(u32, i32), DashError> {
    let current = (clock.today.month0(), clock.today.year());
    let Some(first) = args.first() else {
        return Ok(current);
    };

    if args.len() > 2 {
        return Err(DashError::invalid("calendar takes at most MONTH and YEAR"));
    }

    let (month, mut year) = if first.starts_with('+') || first.starts_with('-') {
        let step = first
            .parse::<i32>()
            .map_err(|_| DashError::invalid(format!("invalid month offset: {first}")))?;
        shift_month(current.0, current.1, step)
    } else if let Ok(number) = first.parse::<u32>() {
        if !(1..=12).contains(&number) {
            return Err(DashError::invalid(format!(
                "month must be between 1 and 12, got {number}"
            )));
        }
        (number - 1, current.1)
    } else if let Some(number) = parse_month_name(first) {
        (number - 1, current.1)
    } else {
        return Err(DashError::invalid(format!("unknown month: {first}")));
    };

    if let Some(raw_year) = args.get(1) {
        year = raw_year
            .parse::<i32>()
            .map_err(|_| DashError::invalid(format!("invalid year: {raw_year}")))?;
    }

    Ok((month, year))
}

fn cmd_ago<W: Write>(
    renderer: &Renderer,
    args: &[String],
    clock: &Clock,
    out: &mut W,
) -> anyhow::Result<()> {
    let raw = args.join(" ");
    let label = format_relative_str((!args.is_empty()).then_some(raw.as_str()), clock.now);
    renderer.relative_label(out, &label)
}

#[instrument(skip_all)]
fn cmd_list<W: Write>(
    store: &DataStore,
    cfg: &Config,
    renderer: &Renderer,
    filter_terms: &[String],
    args: &[String],
    clock: &Clock,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command list");

    let terms: Vec<String> = filter_terms.iter().chain(args).cloned().collect();
    let query = ListQuery::parse(&terms, clock.today, per_page(cfg)?)?;
    let tasks = store.load_tasks()?;
    let (page, info) = query.apply(&tasks);

    debug!(shown = page.len(), total = info.total_count, "listing tasks");
    renderer.task_table(out, &page, &info, clock)
}

fn cmd_today<W: Write>(
    store: &DataStore,
    cfg: &Config,
    renderer: &Renderer,
    filter_terms: &[String],
    clock: &Clock,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command today");
    let tasks = load_selected(store, cfg, filter_terms, clock)?;
    let lines = today_tasks(&tasks, clock.now, clock.today, clock.tz);
    renderer.task_lines(out, &lines)
}

#[instrument(skip_all)]
fn cmd_add<W: Write>(
    store: &mut DataStore,
    renderer: &Renderer,
    args: &[String],
    clock: &Clock,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command add");

    let tasks = store.load_tasks()?;
    let next_id = store.next_id(&tasks);
    let task = parse_new_task(next_id, args, clock)?;
    let created = task.clone();

    let tasks = store.add_task(tasks, task)?;
    debug!(count = tasks.len(), "task added");
    renderer.created(out, &created)
}

/// Title words plus `category:`, `priority:`, `due:` and `+tag` modifiers.
fn parse_new_task(id: u64, args: &[String], clock: &Clock) -> anyhow::Result<Task> {
    let mut title_words = Vec::new();
    let mut task = Task::new_pending(id, String::new(), clock.now);

    for arg in args {
        if let Some(value) = arg
            .strip_prefix("category:")
            .or_else(|| arg.strip_prefix("project:"))
        {
            task.category = (!value.is_empty()).then(|| value.to_string());
        } else if let Some(value) = arg.strip_prefix("priority:") {
            let priority = value
                .parse::<u8>()
                .map_err(|_| DashError::invalid(format!("invalid priority: {value}")))?;
            task.priority = validate_priority(priority)?;
        } else if let Some(value) = arg.strip_prefix("due:") {
            let due = parse_date_expr(value, clock.today)
                .with_context(|| format!("invalid due date: {value}"))?;
            task.due_date = Some(due);
        } else if let Some(tag) = arg.strip_prefix('+')
            && !tag.is_empty()
        {
            if !task.tags.iter().any(|t| t == tag) {
                task.tags.push(tag.to_string());
            }
        } else {
            title_words.push(arg.as_str());
        }
    }

    let title = title_words.join(" ");
    if title.trim().is_empty() {
        return Err(DashError::invalid("add requires a title").into());
    }
    task.title = title;
    Ok(task)
}

#[instrument(skip_all)]
fn cmd_toggle<W: Write>(
    store: &mut DataStore,
    renderer: &Renderer,
    args: &[String],
    clock: &Clock,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command toggle");

    let [raw_id] = args else {
        return Err(DashError::invalid("toggle requires exactly one task id").into());
    };
    let id = raw_id
        .parse::<u64>()
        .map_err(|_| DashError::invalid(format!("invalid task id: {raw_id}")))?;

    let outcome = store.toggle_task(id, clock.now)?;
    renderer.toggle(out, &outcome)
}

fn cmd_summary<W: Write>(
    store: &DataStore,
    cfg: &Config,
    renderer: &Renderer,
    filter_terms: &[String],
    clock: &Clock,
    out: &mut W,
) -> anyhow::Result<()> {
    let tasks = load_selected(store, cfg, filter_terms, clock)?;
    renderer.summary(out, &summary_stats(&tasks, clock.today))
}

fn cmd_analytics<W: Write>(
    store: &DataStore,
    cfg: &Config,
    renderer: &Renderer,
    filter_terms: &[String],
    args: &[String],
    clock: &Clock,
    out: &mut W,
) -> anyhow::Result<()> {
    let period = match args.first() {
        Some(raw) => raw.parse::<AnalyticsPeriod>()?,
        None => configured_period(cfg)?,
    };
    let tasks = load_selected(store, cfg, filter_terms, clock)?;
    let points = analytics_series(&tasks, period, clock.today, clock.tz);
    renderer.analytics(out, period, &points)
}

fn cmd_categories<W: Write>(
    store: &DataStore,
    cfg: &Config,
    renderer: &Renderer,
    filter_terms: &[String],
    clock: &Clock,
    out: &mut W,
) -> anyhow::Result<()> {
    let tasks = load_selected(store, cfg, filter_terms, clock)?;
    renderer.categories(out, &category_breakdown(&tasks))
}

fn cmd_show<W: Write>(cfg: &Config, out: &mut W) -> anyhow::Result<()> {
    for (k, v) in cfg.iter() {
        writeln!(out, "{k}={v}")?;
    }
    Ok(())
}

fn cmd_help<W: Write>(out: &mut W) -> anyhow::Result<()> {
    writeln!(
        out,
        "Commands: {} (unique prefixes accepted)",
        known_command_names().join(", ")
    )?;
    writeln!(
        out,
        "Filters before the command narrow tasks: status:X category:X priority:N +tag -tag due.before:DATE due.after:DATE"
    )?;
    Ok(())
}
