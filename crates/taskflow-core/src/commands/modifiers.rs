use anyhow::anyhow;
use chrono::NaiveDate;
use tracing::trace;

use crate::datetime::parse_due_date;
use crate::filter::StatusFilter;
use crate::task::{
  Category,
  Priority,
  TaskDraft
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Mod {
  Category(Category),
  Priority(Priority),
  Due(Option<NaiveDate>),
  Status(StatusFilter)
}

/// Free words and `key:value`
/// modifiers, split apart.
#[derive(Debug, Clone, Default)]
pub(crate) struct WordsAndMods {
  pub words: Vec<String>,
  pub mods: Vec<Mod>
}

impl WordsAndMods {
  pub fn text(&self) -> String {
    self.words.join(" ")
  }
}

/// Everything after `--` is a plain
/// word.
pub(crate) fn parse_words_and_mods(
  args: &[String],
  today: NaiveDate
) -> anyhow::Result<WordsAndMods> {
  let mut out = WordsAndMods::default();

  let mut literal = false;
  for arg in args {
    if arg == "--" && !literal {
      literal = true;
      continue;
    }

    if !literal
      && let Some(one_mod) =
        parse_one_mod(arg, today)?
    {
      trace!(?one_mod, "parsed modifier");
      out.mods.push(one_mod);
      continue;
    }

    out.words.push(arg.clone());
  }

  Ok(out)
}

fn parse_one_mod(
  tok: &str,
  today: NaiveDate
) -> anyhow::Result<Option<Mod>> {
  let Some((key, value)) =
    tok.split_once(':')
  else {
    return Ok(None);
  };

  match key
    .to_ascii_lowercase()
    .as_str()
  {
    | "cat" | "category" => {
      Ok(Some(Mod::Category(
        value.parse()?
      )))
    }
    | "pri" | "priority" => {
      Ok(Some(Mod::Priority(
        value.parse()?
      )))
    }
    | "due" => {
      Ok(Some(Mod::Due(
        parse_due_date(value, today)?
      )))
    }
    | "status" => {
      Ok(Some(Mod::Status(
        value.parse()?
      )))
    }
    | _ => Ok(None)
  }
}

pub(crate) fn apply_mods(
  draft: &mut TaskDraft,
  mods: &[Mod]
) -> anyhow::Result<()> {
  for one_mod in mods {
    match one_mod {
      | Mod::Category(category) => {
        draft.category = *category;
      }
      | Mod::Priority(priority) => {
        draft.priority = *priority;
      }
      | Mod::Due(due) => {
        draft.due_date = *due;
      }
      | Mod::Status(_) => {
        return Err(anyhow!(
          "status: only applies to \
           list"
        ));
      }
    }
  }

  Ok(())
}
