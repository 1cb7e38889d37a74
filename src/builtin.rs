pub const BUILTIN_CSS: &str = include_str!("builtin.css");

/// Class carried by every result title link. A result container holding it
/// already shows results and must not be overwritten by the loading block.
pub const RESULT_ITEM_CLASS: &str = "list-group-item";

pub const RESULT_TITLE_CLASS: &str =
    "list-group-item list-group-item-action font-weight-bolder search-list-title";

pub const RESULT_CONTENT_CLASS: &str = "search-list-content";

pub const HIGHLIGHT_CLASS: &str = "search-word";

pub const ELLIPSIS: &str = "...";
