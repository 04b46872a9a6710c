use std::cmp::Ordering;

use anyhow::{
  Context,
  anyhow
};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::trace;

use crate::datetime::parse_date_expr;
use crate::task::{
  Status,
  Task,
  validate_priority
};

pub const DEFAULT_PER_PAGE: usize = 20;
pub const MAX_PER_PAGE: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum Pred {
  StatusEq(Status),
  CategoryEq(String),
  PriorityEq(u8),
  TagInclude(String),
  TagExclude(String),
  DueBefore(NaiveDate),
  DueAfter(NaiveDate),
  TextContains(String)
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum SortKey {
  Title,
  Priority,
  Status,
  DueDate,
  CreatedAt,
  UpdatedAt
}

impl SortKey {
  fn parse(
    raw: &str
  ) -> anyhow::Result<Self> {
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "title" => Ok(SortKey::Title),
      | "priority" => {
        Ok(SortKey::Priority)
      }
      | "status" => Ok(SortKey::Status),
      | "due" | "due_date" => {
        Ok(SortKey::DueDate)
      }
      | "created" | "created_at" => {
        Ok(SortKey::CreatedAt)
      }
      | "updated" | "updated_at" => {
        Ok(SortKey::UpdatedAt)
      }
      | other => {
        Err(anyhow!(
          "unknown sort key: {other}"
        ))
      }
    }
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum SortOrder {
  Asc,
  Desc
}

#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub struct PageInfo {
  pub page:        usize,
  pub per_page:    usize,
  pub total_pages: usize,
  pub total_count: usize,
  pub has_prev:    bool,
  pub has_next:    bool
}

#[derive(Debug, Clone)]
pub struct ListQuery {
  preds:    Vec<Pred>,
  sort:     SortKey,
  order:    SortOrder,
  page:     usize,
  per_page: usize
}

impl ListQuery {
  pub fn new(per_page: usize) -> Self {
    Self {
      preds: vec![],
      sort: SortKey::CreatedAt,
      order: SortOrder::Desc,
      page: 1,
      per_page: per_page
        .clamp(1, MAX_PER_PAGE)
    }
  }

  /// Parses list terms. Unrecognised
  /// words become a text search.
  #[tracing::instrument(skip(terms, today))]
  pub fn parse(
    terms: &[String],
    today: NaiveDate,
    per_page: usize
  ) -> anyhow::Result<Self> {
    let mut query = Self::new(per_page);
    let mut words = Vec::new();

    for term in terms {
      let term = term.trim();
      if term.is_empty() {
        continue;
      }

      if let Some(tag) =
        term.strip_prefix('+')
        && !tag.is_empty()
      {
        query.preds.push(
          Pred::TagInclude(
            tag.to_ascii_lowercase()
          )
        );
        continue;
      }
      if let Some(tag) =
        term.strip_prefix('-')
        && !tag.is_empty()
      {
        query.preds.push(
          Pred::TagExclude(
            tag.to_ascii_lowercase()
          )
        );
        continue;
      }

      let Some((key, value)) =
        term.split_once(':')
      else {
        words.push(term.to_string());
        continue;
      };

      match key
        .to_ascii_lowercase()
        .as_str()
      {
        | "status" => {
          query.preds.push(
            Pred::StatusEq(
              value.parse::<Status>()?
            )
          )
        }
        | "category" | "project" => {
          query.preds.push(
            Pred::CategoryEq(
              value.to_string()
            )
          )
        }
        | "priority" => {
          let raw: u8 =
            value.parse().with_context(
              || {
                format!(
                  "invalid priority: \
                   {value}"
                )
              }
            )?;
          query.preds.push(
            Pred::PriorityEq(
              validate_priority(raw)?
            )
          )
        }
        | "due.before" => {
          query.preds.push(
            Pred::DueBefore(
              parse_date_expr(
                value, today
              )?
            )
          )
        }
        | "due.after" => {
          query.preds.push(
            Pred::DueAfter(
              parse_date_expr(
                value, today
              )?
            )
          )
        }
        | "sort" => {
          query.sort =
            SortKey::parse(value)?
        }
        | "order" => {
          query.order = match value
            .to_ascii_lowercase()
            .as_str()
          {
            | "asc" => SortOrder::Asc,
            | "desc" => SortOrder::Desc,
            | other => {
              return Err(anyhow!(
                "unknown sort order: \
                 {other}"
              ));
            }
          }
        }
        | "page" => {
          let page: usize =
            value.parse().with_context(
              || {
                format!(
                  "invalid page: {value}"
                )
              }
            )?;
          if page == 0 {
            return Err(anyhow!(
              "page must be at least 1"
            ));
          }
          query.page = page;
        }
        | "limit" => {
          let per_page: usize =
            value.parse().with_context(
              || {
                format!(
                  "invalid limit: {value}"
                )
              }
            )?;
          if per_page == 0
            || per_page > MAX_PER_PAGE
          {
            return Err(anyhow!(
              "limit must be within \
               1..={MAX_PER_PAGE}"
            ));
          }
          query.per_page = per_page;
        }
        | _ => words.push(term.to_string())
      }
    }

    if !words.is_empty() {
      query.preds.push(
        Pred::TextContains(
          words.join(" ").to_lowercase()
        )
      );
    }

    trace!(
      preds = ?query.preds,
      sort = ?query.sort,
      order = ?query.order,
      "parsed list query"
    );
    Ok(query)
  }

  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    self
      .preds
      .iter()
      .all(|pred| eval_pred(pred, task))
  }

  /// Filters, sorts and slices out the
  /// requested page.
  pub fn apply<'a>(
    &self,
    tasks: &'a [Task]
  ) -> (Vec<&'a Task>, PageInfo) {
    let mut matched: Vec<&Task> = tasks
      .iter()
      .filter(|task| self.matches(task))
      .collect();

    matched.sort_by(|a, b| {
      let ord = compare_by(self.sort, a, b)
        .then_with(|| a.id.cmp(&b.id));
      match self.order {
        | SortOrder::Asc => ord,
        | SortOrder::Desc => ord.reverse()
      }
    });

    let total_count = matched.len();
    let total_pages = total_count
      .div_ceil(self.per_page);
    let start = (self.page - 1)
      .saturating_mul(self.per_page);
    let page: Vec<&Task> = matched
      .into_iter()
      .skip(start)
      .take(self.per_page)
      .collect();

    let info = PageInfo {
      page: self.page,
      per_page: self.per_page,
      total_pages,
      total_count,
      has_prev: self.page > 1,
      has_next: self.page < total_pages
    };
    (page, info)
  }
}

fn eval_pred(
  pred: &Pred,
  task: &Task
) -> bool {
  match pred {
    | Pred::StatusEq(status) => {
      task.status == *status
    }
    | Pred::CategoryEq(name) => {
      task.category.as_deref().is_some_and(
        |category| {
          category.eq_ignore_ascii_case(
            name
          )
        }
      )
    }
    | Pred::PriorityEq(priority) => {
      task.priority == *priority
    }
    | Pred::TagInclude(tag) => {
      has_tag(task, tag)
    }
    | Pred::TagExclude(tag) => {
      !has_tag(task, tag)
    }
    | Pred::DueBefore(date) => {
      task
        .due_date
        .is_some_and(|due| due < *date)
    }
    | Pred::DueAfter(date) => {
      task
        .due_date
        .is_some_and(|due| due > *date)
    }
    | Pred::TextContains(needle) => {
      task
        .title
        .to_lowercase()
        .contains(needle)
        || task
          .description
          .as_deref()
          .is_some_and(|desc| {
            desc
              .to_lowercase()
              .contains(needle)
          })
        || task.tags.iter().any(|tag| {
          tag.to_lowercase().contains(needle)
        })
    }
  }
}

fn has_tag(
  task: &Task,
  tag: &str
) -> bool {
  task
    .tags
    .iter()
    .any(|t| t.eq_ignore_ascii_case(tag))
}

/// Missing values sort before present
/// ones.
fn compare_by(
  key: SortKey,
  a: &Task,
  b: &Task
) -> Ordering {
  match key {
    | SortKey::Title => {
      a.title
        .to_lowercase()
        .cmp(&b.title.to_lowercase())
    }
    | SortKey::Priority => {
      a.priority.cmp(&b.priority)
    }
    | SortKey::Status => {
      a.status.cmp(&b.status)
    }
    | SortKey::DueDate => {
      a.due_date.cmp(&b.due_date)
    }
    | SortKey::CreatedAt => {
      a.created_at.cmp(&b.created_at)
    }
    | SortKey::UpdatedAt => {
      a.updated_at.cmp(&b.updated_at)
    }
  }
}
