use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use serde::Serialize;
use serde_json::json;
use unicode_width::UnicodeWidthStr;

use crate::calendar::{CalendarGrid, GRID_COLUMNS, MonthRelation, WEEKDAY_LABELS};
use crate::config::Config;
use crate::dashboard::{
    AnalyticsPeriod, AnalyticsPoint, CategoryBreakdown, DashboardView, SummaryStats, TaskLine,
};
use crate::datastore::ToggleOutcome;
use crate::datetime::Clock;
use crate::filter::PageInfo;
use crate::relative::format_relative;
use crate::task::{Task, priority_label};

const CELL_WIDTH: usize = 4;
const MAX_BAR: usize = 40;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    json: bool,
}

impl Renderer {
    pub fn new(cfg: &Config, json: bool) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or("on");
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
            json,
        })
    }

    pub fn with_options(color: bool, json: bool) -> Self {
        Self { color, json }
    }

    #[tracing::instrument(skip_all, fields(month = grid.month(), year = grid.year()))]
    pub fn calendar<W: Write>(&self, mut out: W, grid: &CalendarGrid) -> anyhow::Result<()> {
        if self.json {
            return write_json(out, grid);
        }
        write_calendar(&mut out, grid, |text, relation, is_today| {
            if is_today {
                self.paint(text, "1;33")
            } else if relation != MonthRelation::Current {
                self.paint(text, "2")
            } else {
                text.to_string()
            }
        })
    }

    pub fn relative_label<W: Write>(&self, mut out: W, label: &str) -> anyhow::Result<()> {
        if self.json {
            return write_json(out, &json!({ "time_ago": label }));
        }
        writeln!(out, "{label}")?;
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(count = lines.len()))]
    pub fn task_lines<W: Write>(&self, mut out: W, lines: &[TaskLine]) -> anyhow::Result<()> {
        if self.json {
            return write_json(out, &json!({ "tasks": lines }));
        }
        if lines.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }
        let rows = lines
            .iter()
            .map(|line| {
                let mark = if line.completed { "[x]" } else { "[ ]" };
                vec![
                    self.paint(&line.id.to_string(), "33"),
                    mark.to_string(),
                    line.title.clone(),
                    line.time_ago.clone(),
                ]
            })
            .collect();
        write_table(&mut out, headers(&["ID", "Done", "Title", "Created"]), rows)
    }

    #[tracing::instrument(skip_all, fields(count = tasks.len()))]
    pub fn task_table<W: Write>(
        &self,
        mut out: W,
        tasks: &[&Task],
        page: &PageInfo,
        clock: &Clock,
    ) -> anyhow::Result<()> {
        if self.json {
            return write_json(out, &json!({ "tasks": tasks, "pagination": page }));
        }

        let rows = tasks
            .iter()
            .map(|task| {
                let due = task
                    .due_date
                    .map(|date| date.format("%Y-%m-%d").to_string())
                    .unwrap_or_default();
                let due = match task.due_date {
                    Some(date) if !task.is_completed() && date < clock.today => {
                        self.paint(&due, "31")
                    }
                    _ => due,
                };
                let tags = task
                    .tags
                    .iter()
                    .map(|tag| format!("+{tag}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                vec![
                    self.paint(&task.id.to_string(), "33"),
                    task.status.to_string(),
                    priority_label(task.priority).to_string(),
                    task.category.clone().unwrap_or_default(),
                    due,
                    task.title.clone(),
                    tags,
                    format_relative(task.created_at, clock.now),
                ]
            })
            .collect();

        write_table(
            &mut out,
            headers(&[
                "ID", "Status", "Pri", "Category", "Due", "Title", "Tags", "Created",
            ]),
            rows,
        )?;
        writeln!(
            out,
            "page {}/{} ({} tasks)",
            page.page,
            page.total_pages.max(1),
            page.total_count
        )?;
        Ok(())
    }

    pub fn summary<W: Write>(&self, mut out: W, stats: &SummaryStats) -> anyhow::Result<()> {
        if self.json {
            return write_json(out, stats);
        }
        write_summary(&mut out, stats)
    }

    #[tracing::instrument(skip_all, fields(period = ?period, points = points.len()))]
    pub fn analytics<W: Write>(
        &self,
        mut out: W,
        period: AnalyticsPeriod,
        points: &[AnalyticsPoint],
    ) -> anyhow::Result<()> {
        if self.json {
            return write_json(out, &json!({ "period": period, "data": points }));
        }
        write_analytics(&mut out, points)
    }

    pub fn categories<W: Write>(
        &self,
        mut out: W,
        breakdown: &CategoryBreakdown,
    ) -> anyhow::Result<()> {
        if self.json {
            return write_json(out, breakdown);
        }
        write_categories(&mut out, breakdown)
    }

    pub fn toggle<W: Write>(&self, mut out: W, outcome: &ToggleOutcome) -> anyhow::Result<()> {
        if self.json {
            return write_json(
                out,
                &json!({ "status": "success", "id": outcome.id, "new_status": outcome.current }),
            );
        }
        writeln!(
            out,
            "Task {} is now {} (was {}).",
            outcome.id, outcome.current, outcome.previous
        )?;
        Ok(())
    }

    pub fn created<W: Write>(&self, mut out: W, task: &Task) -> anyhow::Result<()> {
        if self.json {
            return write_json(out, task);
        }
        writeln!(out, "Created task {}.", task.id)?;
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub fn dashboard<W: Write>(&self, mut out: W, view: &DashboardView) -> anyhow::Result<()> {
        if self.json {
            return write_json(out, view);
        }

        write_summary(&mut out, &view.summary)?;
        writeln!(out)?;
        writeln!(out, "Recent tasks")?;
        self.task_lines(&mut out, &view.recent)?;
        writeln!(out)?;
        self.calendar(&mut out, &view.calendar)?;
        writeln!(out)?;
        writeln!(out, "Activity ({})", view.period.as_str())?;
        write_analytics(&mut out, &view.analytics)?;
        writeln!(out)?;
        writeln!(out, "Project categories")?;
        write_categories(&mut out, &view.categories)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn write_json<W: Write, T: Serialize + ?Sized>(mut out: W, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Seven right-aligned columns; today carries a trailing `*`.
fn write_calendar<W, F>(out: &mut W, grid: &CalendarGrid, style: F) -> anyhow::Result<()>
where
    W: Write,
    F: Fn(&str, MonthRelation, bool) -> String,
{
    let row_width = CELL_WIDTH * GRID_COLUMNS - 1;
    let title = grid.title();
    let pad = row_width.saturating_sub(UnicodeWidthStr::width(title.as_str())) / 2;
    writeln!(out, "{}{}", " ".repeat(pad), title)?;

    let labels = WEEKDAY_LABELS
        .iter()
        .map(|label| format!("{label:>width$}", width = CELL_WIDTH - 1))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(out, "{labels}")?;

    for week in grid.weeks() {
        let mut line = String::new();
        for cell in week {
            let marker = if cell.is_today { "*" } else { " " };
            let text = format!("{:>width$}", cell.day_number, width = CELL_WIDTH - 1);
            line.push_str(&style(&text, cell.month_relation, cell.is_today));
            line.push_str(marker);
        }
        writeln!(out, "{}", line.trim_end())?;
    }
    Ok(())
}

fn write_summary<W: Write>(out: &mut W, stats: &SummaryStats) -> anyhow::Result<()> {
    writeln!(
        out,
        "total {}  ongoing {}  upcoming {}  pending {}  completed {}",
        stats.total, stats.ongoing, stats.upcoming, stats.pending, stats.completed
    )?;
    Ok(())
}

fn write_analytics<W: Write>(out: &mut W, points: &[AnalyticsPoint]) -> anyhow::Result<()> {
    let peak = points.iter().map(|p| p.count).max().unwrap_or(0);
    let rows = points
        .iter()
        .map(|point| {
            let bar = if peak == 0 {
                0
            } else {
                (point.count * MAX_BAR).div_ceil(peak)
            };
            vec![
                point.date.format("%Y-%m-%d").to_string(),
                point.day.clone(),
                point.count.to_string(),
                "#".repeat(bar),
            ]
        })
        .collect();
    write_table(out, headers(&["Date", "Day", "Tasks", ""]), rows)
}

fn write_categories<W: Write>(out: &mut W, breakdown: &CategoryBreakdown) -> anyhow::Result<()> {
    if breakdown.categories.is_empty() {
        writeln!(out, "No categorised tasks.")?;
        return Ok(());
    }
    let rows = breakdown
        .categories
        .iter()
        .map(|share| {
            vec![
                share.name.clone(),
                share.count.to_string(),
                format!("{:.1}%", share.percentage),
            ]
        })
        .collect();
    write_table(&mut *out, headers(&["Category", "Tasks", "Share"]), rows)?;
    writeln!(
        out,
        "{:.1}% of {} tasks categorised",
        breakdown.percentage_total(),
        breakdown.total
    )?;
    Ok(())
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let header_line = headers
        .iter()
        .zip(&widths)
        .map(|(header, width)| format!("{header:width$}", width = *width))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(writer, "{}", header_line.trim_end())?;

    let rule = widths
        .iter()
        .map(|width| "-".repeat(*width))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(writer, "{}", rule.trim_end())?;

    for row in rows {
        let mut line = String::new();
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            if idx > 0 {
                line.push(' ');
            }
            line.push_str(cell);
            line.push_str(&" ".repeat(padding));
        }
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
