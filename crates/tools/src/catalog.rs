//! The fixed tool catalog: names, descriptions and input schemas.
//!
//! Every tool the model can see is listed here, in the order it is offered.
//! Whether a tool runs in-process or on the client is decided when the
//! registry is built, not here.

use pengate_core::ToolDefinition;
use serde_json::{Value, json};

/// Static description of one tool.
#[derive(Debug)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// Local tools never touch the document.
    pub local: bool,
    schema: fn() -> Value,
}

impl ToolSpec {
    pub fn schema(&self) -> Value {
        (self.schema)()
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.to_string(),
            description: self.description.to_string(),
            parameters: self.schema(),
        }
    }
}

const NODE_TYPES: [&str; 13] = [
    "frame",
    "group",
    "rectangle",
    "ellipse",
    "line",
    "polygon",
    "path",
    "text",
    "connection",
    "note",
    "icon_font",
    "image",
    "ref",
];

const PROPERTY_NAMES: [&str; 10] = [
    "fillColor",
    "textColor",
    "strokeColor",
    "strokeThickness",
    "cornerRadius",
    "padding",
    "gap",
    "fontSize",
    "fontFamily",
    "fontWeight",
];

fn object(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

fn no_arguments() -> Value {
    object(json!({}), &[])
}

pub const GET_EDITOR_STATE: ToolSpec = ToolSpec {
    name: "get_editor_state",
    description: "Get the current editor state: the open document, the user's selection, \
                  the top-level nodes and the reusable components available. Call this first.",
    local: false,
    schema: || {
        object(
            json!({
                "include_schema": {
                    "type": "boolean",
                    "description": "Include the document node schema. Set true when you need the node format."
                }
            }),
            &["include_schema"],
        )
    },
};

pub const OPEN_DOCUMENT: ToolSpec = ToolSpec {
    name: "open_document",
    description: "Open an existing document or start a new one. Pass \"new\" for a blank \
                  document, or a file path to open.",
    local: false,
    schema: || {
        object(
            json!({
                "filePathOrTemplate": {
                    "type": "string",
                    "description": "Path of an existing document, or \"new\"."
                }
            }),
            &["filePathOrTemplate"],
        )
    },
};

pub const BATCH_GET: ToolSpec = ToolSpec {
    name: "batch_get",
    description: "Read nodes by id or find them by pattern, with depth control. Use it to \
                  inspect structure before changing it.",
    local: false,
    schema: || {
        object(
            json!({
                "patterns": {
                    "type": "array",
                    "description": "Search patterns; a node matches when every given field matches.",
                    "items": {
                        "type": "object",
                        "properties": {
                            "type": { "type": "string", "enum": NODE_TYPES },
                            "name": { "type": "string", "description": "Regular expression matched against the node name." },
                            "reusable": { "type": "boolean" }
                        },
                        "additionalProperties": false
                    }
                },
                "nodeIds": { "type": "array", "items": { "type": "string" }, "description": "Node ids to read." },
                "parentId": { "type": "string", "description": "Limit the search to this subtree." },
                "readDepth": { "type": "number", "description": "How deep to read children (default 1). Deeper nodes show as '...'." },
                "searchDepth": { "type": "number", "description": "How deep to search. Unlimited when omitted." },
                "resolveInstances": { "type": "boolean", "description": "Expand ref nodes instead of showing them as references." },
                "resolveVariables": { "type": "boolean", "description": "Replace variable references with their current values." },
                "includePathGeometry": { "type": "boolean", "description": "Include full path geometry." }
            }),
            &[],
        )
    },
};

pub const SNAPSHOT_LAYOUT: ToolSpec = ToolSpec {
    name: "snapshot_layout",
    description: "Get computed layout rectangles: where nodes actually end up after layout. \
                  Use it to spot clipped or overflowing content and to find room for new content.",
    local: false,
    schema: || {
        object(
            json!({
                "parentId": { "type": "string", "description": "Subtree root. Omit for the whole document." },
                "maxDepth": { "type": "number", "description": "Traversal depth. Defaults to direct children only." },
                "problemsOnly": { "type": "boolean", "description": "Only report nodes with layout problems." }
            }),
            &[],
        )
    },
};

pub const GET_VARIABLES: ToolSpec = ToolSpec {
    name: "get_variables",
    description: "Read all design variables (tokens) and themes of the document. Values may \
                  differ per theme.",
    local: false,
    schema: no_arguments,
};

pub const BATCH_DESIGN: ToolSpec = ToolSpec {
    name: "batch_design",
    description: include_str!("../text/batch_design.md"),
    local: false,
    schema: || {
        object(
            json!({
                "operations": {
                    "type": "string",
                    "description": "Mini-script with I/C/U/R/M/D/G operations, one per line."
                }
            }),
            &["operations"],
        )
    },
};

pub const SET_VARIABLES: ToolSpec = ToolSpec {
    name: "set_variables",
    description: "Add or update design variables and themes. Merges with the existing set \
                  unless replace is true.",
    local: false,
    schema: || {
        object(
            json!({
                "variables": { "type": "object", "description": "Variable definitions to add or merge." },
                "replace": { "type": "boolean", "description": "Replace every existing variable. Default is merge." }
            }),
            &["variables"],
        )
    },
};

fn swaps(item: Value) -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": { "from": item, "to": item },
            "required": ["from", "to"],
            "additionalProperties": false
        }
    })
}

pub const REPLACE_ALL_MATCHING_PROPERTIES: ToolSpec = ToolSpec {
    name: "replace_all_matching_properties",
    description: "Find and replace property values recursively under the given parents. \
                  Useful for rebranding and bulk spacing or font changes.",
    local: false,
    schema: || {
        let string = json!({ "type": "string" });
        let number = json!({ "type": "number" });
        let numbers = json!({ "type": "array", "items": { "type": "number" } });
        object(
            json!({
                "parents": { "type": "array", "items": { "type": "string" }, "description": "Node ids to search recursively." },
                "properties": {
                    "type": "object",
                    "description": "Each key maps to a list of {from, to} pairs.",
                    "properties": {
                        "fillColor": swaps(string.clone()),
                        "textColor": swaps(string.clone()),
                        "strokeColor": swaps(string.clone()),
                        "strokeThickness": swaps(number.clone()),
                        "cornerRadius": swaps(numbers),
                        "padding": swaps(number.clone()),
                        "gap": swaps(number.clone()),
                        "fontSize": swaps(number),
                        "fontFamily": swaps(string.clone()),
                        "fontWeight": swaps(string)
                    },
                    "additionalProperties": false
                }
            }),
            &["parents", "properties"],
        )
    },
};

pub const FIND_EMPTY_SPACE_ON_CANVAS: ToolSpec = ToolSpec {
    name: "find_empty_space_on_canvas",
    description: "Find free canvas space of the given size in one direction. Use it before \
                  inserting new top-level frames so they do not overlap.",
    local: false,
    schema: || {
        object(
            json!({
                "direction": { "type": "string", "enum": ["top", "right", "bottom", "left"] },
                "width": { "type": "number", "description": "Required width." },
                "height": { "type": "number", "description": "Required height." },
                "padding": { "type": "number", "description": "Minimum distance from other content." },
                "nodeId": { "type": "string", "description": "Search around this node instead of all content." }
            }),
            &["direction", "width", "height", "padding"],
        )
    },
};

pub const SEARCH_ALL_UNIQUE_PROPERTIES: ToolSpec = ToolSpec {
    name: "search_all_unique_properties",
    description: "List every distinct value of the given properties under the given parents. \
                  Useful for auditing colors or type sizes in use.",
    local: false,
    schema: || {
        object(
            json!({
                "parents": { "type": "array", "items": { "type": "string" }, "description": "Node ids to search recursively." },
                "properties": { "type": "array", "items": { "type": "string", "enum": PROPERTY_NAMES } }
            }),
            &["parents", "properties"],
        )
    },
};

pub const GET_GUIDELINES: ToolSpec = ToolSpec {
    name: "get_guidelines",
    description: "Get design rules for a topic. Returns static instructions.",
    local: true,
    schema: || {
        object(
            json!({
                "topic": {
                    "type": "string",
                    "enum": crate::guidelines::GuidelineTopic::NAMES,
                    "description": "Topic to read."
                }
            }),
            &["topic"],
        )
    },
};

pub const GET_STYLE_GUIDE_TAGS: ToolSpec = ToolSpec {
    name: "get_style_guide_tags",
    description: "List the tags get_style_guide understands. Call it before get_style_guide.",
    local: true,
    schema: no_arguments,
};

pub const GET_STYLE_GUIDE: ToolSpec = ToolSpec {
    name: "get_style_guide",
    description: "Get a style guide for inspiration, either matching 5-10 tags or by name.",
    local: true,
    schema: || {
        object(
            json!({
                "tags": { "type": "array", "items": { "type": "string" }, "description": "5-10 tags to match." },
                "name": { "type": "string", "description": "A specific style guide." }
            }),
            &[],
        )
    },
};

/// All tools, in the order they are offered to the model.
pub const CATALOG: [&ToolSpec; 13] = [
    &GET_EDITOR_STATE,
    &OPEN_DOCUMENT,
    &BATCH_GET,
    &SNAPSHOT_LAYOUT,
    &GET_VARIABLES,
    &BATCH_DESIGN,
    &SET_VARIABLES,
    &REPLACE_ALL_MATCHING_PROPERTIES,
    &FIND_EMPTY_SPACE_ON_CANVAS,
    &SEARCH_ALL_UNIQUE_PROPERTIES,
    &GET_GUIDELINES,
    &GET_STYLE_GUIDE_TAGS,
    &GET_STYLE_GUIDE,
];

pub fn spec(name: &str) -> Option<&'static ToolSpec> {
    CATALOG.into_iter().find(|s| s.name == name)
}
