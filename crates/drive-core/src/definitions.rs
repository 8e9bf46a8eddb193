use serde_json::{json, Value};

use crate::command::{HELP_COMMAND, HISTORY_COMMAND};

const STRING: u8 = 3;
const INTEGER: u8 = 4;
const BOOLEAN: u8 = 5;
const USER: u8 = 6;
const ATTACHMENT: u8 = 11;

fn option(kind: u8, name: &str, description: &str, required: bool) -> Value {
    json!({
        "type": kind,
        "name": name,
        "description": description,
        "required": required,
    })
}

fn autocompleted(name: &str, description: &str) -> Value {
    let mut o = option(STRING, name, description, true);
    o["autocomplete"] = Value::Bool(true);
    o
}

fn command(name: &str, description: &str, options: Vec<Value>, admin: bool) -> Value {
    let mut c = json!({
        "name": name,
        "type": 1,
        "description": description,
        "options": options,
        "dm_permission": false,
    });
    if admin {
        c["default_member_permissions"] = Value::String("8".into());
    }
    c
}

/// Every slash command, in the bulk-overwrite format
pub fn slash_commands() -> Value {
    Value::Array(vec![
        command(
            "upload",
            "Upload a file to your Google Drive",
            vec![option(ATTACHMENT, "file", "File or zip archive to upload", true)],
            false,
        ),
        command("pwd", "Print your current working directory", vec![], false),
        command(
            "cd",
            "Change your current working directory",
            vec![{
                let mut o = option(STRING, "path", "Pick a folder", false);
                o["autocomplete"] = Value::Bool(true);
                o
            }],
            false,
        ),
        command("ls", "List all files in your current working directory", vec![], false),
        command(
            "download",
            "Download a file from your current working directory",
            vec![
                autocompleted("name", "Pick a file"),
                option(STRING, "timeout", "Seconds until the file expires, or inf", false),
                option(BOOLEAN, "public", "Let everyone in the channel see the file", false),
            ],
            false,
        ),
        command(
            "share",
            "Share a file from your current working directory",
            vec![
                autocompleted("name", "Pick a file"),
                option(USER, "user", "Who receives the file", true),
                option(STRING, "timeout", "Seconds until the file expires, or inf", false),
            ],
            false,
        ),
        command(
            "mkdir",
            "Make a new folder in your current working directory",
            vec![option(STRING, "folder_name", "Name of the new folder", true)],
            true,
        ),
        command("authenticate", "Authenticate your google account", vec![], true),
        command(
            HISTORY_COMMAND,
            "DEBUG: Get last n commands",
            vec![{
                let mut o = option(INTEGER, "n", "How many commands", true);
                o["min_value"] = json!(1);
                o
            }],
            true,
        ),
        command(HELP_COMMAND, "Show all useable commands", vec![], false),
    ])
}

/// One line per user-facing command for the help embed
pub const HELP_LINES: [&str; 7] = [
    "`/authenticate`: Regenerates the token needed to enable the API. If re-authentication is needed, the bot will DM the caller a link and wait for the authentication code given to the caller by Google",
    "`/cd <directory>`: Navigates the caller down into a child directory of their current directory. Autocomplete is provided for hints.",
    "`/download <file> <timeout (optional)> <public (optional)>`: Gives the user the file (or a link) to download the file specified. Files have autocomplete. Timeout defaults to 60 seconds, where the file will then no longer be allowed to be downloaded. Public defaults to False, where no other users can see the file.",
    "`/ls`: Shows the caller the contents of their current directory.",
    "`/pwd`: Shows the caller the file path of their current directory.",
    "`/share <file> <user> <timeout (optional)>`: Sends a specified server member a dm with a file from the caller's current directory. Files and users have autocomplete. Timeout defaults to 60 seconds, where the file will then no longer be allowed to be downloaded.",
    "`/upload <attachment>`: Uploads a file or zip file to the caller's current directory. Zip files must contain just the files, and no folders, as they will not be read.",
];
