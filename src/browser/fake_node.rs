//! A stand-in for `node` that speaks the helper protocol without a browser.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use serde_json::Value;

const SCRIPT: &str = r#"#!/usr/bin/env python3
import json, sys
LOG = @LOG@
REPLIES = json.loads(@REPLIES@)
if sys.argv[1:2] == ['--version']:
    print('v20.0.0')
    sys.exit(0)
if len(sys.argv) > 2 and 'readline' not in sys.argv[2]:
    sys.exit(0)
for line in sys.stdin:
    request = json.loads(line)
    op = request['op']
    with open(LOG, 'a') as log:
        log.write(op + '\n')
    reply = REPLIES.get(op, {})
    if reply == 'exit':
        sys.exit(3)
    if isinstance(reply, dict) and 'error' in reply:
        response = {'id': request['id'], 'ok': False, 'error': reply['error']}
    else:
        response = {'id': request['id'], 'ok': True, 'result': reply}
    print(json.dumps(response), flush=True)
    if op == 'close':
        break
"#;

/// Writes an executable fake `node` into `dir`.
///
/// `replies` maps an operation to its result object, to
/// `{"error": {"kind", "message"}}`, or to `"exit"` to make the helper die.
/// Every operation received is appended to the returned log file.
pub(crate) fn fake_node(dir: &Path, replies: Value) -> (PathBuf, PathBuf) {
    let log = dir.join("ops.log");
    let script = SCRIPT
        .replace("@LOG@", &format!("{:?}", log.to_string_lossy()))
        .replace("@REPLIES@", &format!("{:?}", replies.to_string()));
    let path = dir.join("fake-node");
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    (path, log)
}

pub(crate) fn operations(log: &Path) -> Vec<String> {
    fs::read_to_string(log)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}
