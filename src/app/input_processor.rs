//! Builds the run's criteria from the config file or from ids on stdin.

use std::io::{self, Read};

use anyhow::{Context, Result};
use sproket_core::Criteria;

use crate::app::config::RunConfig;
use crate::cli::Args;

/// Index field an id read from stdin is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdField {
    File,
    Dataset,
}

impl IdField {
    pub(crate) fn from_args(args: &Args) -> Option<Self> {
        if args.file_ids {
            Some(Self::File)
        } else if args.dataset_ids {
            Some(Self::Dataset)
        } else {
            None
        }
    }

    fn field(self) -> &'static str {
        match self {
            Self::File => "id",
            Self::Dataset => "dataset_id",
        }
    }
}

/// One criteria per non-blank line of `text`.
pub(crate) fn criteria_from_ids(text: &str, id_field: IdField) -> Vec<Criteria> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|id| Criteria::from_fields([(id_field.field(), id)]))
        .collect()
}

/// Criteria for this run: ids from stdin when an id flag is set, else the config's.
pub(crate) fn collect_criteria(args: &Args, config: &RunConfig) -> Result<Vec<Criteria>> {
    let Some(id_field) = IdField::from_args(args) else {
        return Ok(config.criteria.clone());
    };
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("failed to read ids from stdin")?;
    Ok(criteria_from_ids(&buffer, id_field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_ids_become_id_criteria() {
        let criteria = criteria_from_ids("a.nc|node\n\n  b.nc|node  \n", IdField::File);
        assert_eq!(criteria.len(), 2);
        assert_eq!(criteria[0].fields["id"], "a.nc|node");
        assert_eq!(criteria[1].fields["id"], "b.nc|node");
    }

    #[test]
    fn test_dataset_ids_become_dataset_criteria() {
        let criteria = criteria_from_ids("cmip6.x.v1|node\n", IdField::Dataset);
        assert_eq!(criteria.len(), 1);
        assert_eq!(criteria[0].fields["dataset_id"], "cmip6.x.v1|node");
        assert!(!criteria[0].disabled);
    }

    #[test]
    fn test_blank_input_yields_nothing() {
        assert!(criteria_from_ids("\n \n", IdField::File).is_empty());
    }
}
