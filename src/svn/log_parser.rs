//! Parser for the `svn log --xml --verbose` document shape.

use roxmltree::{Document, Node};

use crate::errors::SvnError;
use crate::svn::types::{ChangeAction, ChangedPath, CopyFrom, LogEntry};

fn get_attr<'a>(n: &Node<'a, '_>, name: &str) -> Option<&'a str> {
    n.attribute(name)
}

fn get_text(n: &Node) -> String {
    n.text().unwrap_or("").to_owned()
}

fn get_child<'a, 'i>(parent: &Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    parent.children().find(|c| c.has_tag_name(name))
}

fn get_child_text(parent: &Node, name: &str) -> Option<String> {
    get_child(parent, name).map(|n| get_text(&n))
}

/// Parses a full `<log>...</log>` document into its `logentry` records.
pub fn parse_log(xml: &str) -> Result<Vec<LogEntry>, SvnError> {
    let doc = Document::parse(xml).map_err(|e| SvnError::XmlParse(e.to_string()))?;
    let root = doc.root_element();
    if !root.has_tag_name("log") {
        return Err(SvnError::XmlParse(format!(
            "expected <log> root element, found <{}>",
            root.tag_name().name()
        )));
    }

    root.children()
        .filter(|n| n.has_tag_name("logentry"))
        .map(parse_logentry)
        .collect()
}

fn parse_logentry(entry: Node) -> Result<LogEntry, SvnError> {
    let revision = get_attr(&entry, "revision")
        .ok_or_else(|| SvnError::XmlParse("logentry missing revision attribute".to_string()))?
        .parse::<i64>()
        .map_err(|e| SvnError::XmlParse(format!("bad revision attribute: {e}")))?;

    let author = get_child_text(&entry, "author").unwrap_or_default();
    let date = get_child_text(&entry, "date").unwrap_or_default();
    let message = get_child_text(&entry, "msg").unwrap_or_default();

    let changed_paths = match get_child(&entry, "paths") {
        Some(paths) => paths
            .children()
            .filter(|n| n.has_tag_name("path"))
            .map(parse_changed_path)
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(LogEntry {
        revision,
        author,
        date,
        message,
        changed_paths,
    })
}

fn parse_changed_path(node: Node) -> Result<ChangedPath, SvnError> {
    let path = get_text(&node);
    let action_attr = get_attr(&node, "action")
        .ok_or_else(|| SvnError::XmlParse("path entry missing action attribute".to_string()))?;
    let action = match action_attr {
        "A" => ChangeAction::Added,
        "D" => ChangeAction::Deleted,
        "M" => ChangeAction::Modified,
        "R" => ChangeAction::Replaced,
        other => {
            return Err(SvnError::XmlParse(format!(
                "unrecognized changed-path action {other:?}"
            )))
        }
    };

    let copy_from = match (
        get_attr(&node, "copyfrom-path"),
        get_attr(&node, "copyfrom-rev"),
    ) {
        (Some(p), Some(r)) => Some(CopyFrom {
            path: p.to_string(),
            revision: r
                .parse::<i64>()
                .map_err(|e| SvnError::XmlParse(format!("bad copyfrom-rev attribute: {e}")))?,
        }),
        _ => None,
    };

    Ok(ChangedPath {
        path,
        action,
        copy_from,
    })
}
