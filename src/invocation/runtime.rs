//! Interpreters for out-of-process handlers.
//!
//! A handler module `pkg.app` under code location `src/` is looked for as
//! `src/pkg/app.py`, `src/pkg/app.js`, `src/pkg/app.mjs`, `src/pkg/app.sh`
//! and finally `src/pkg/app`, in that order.
//!
//! Every runtime speaks the same protocol: two JSON lines on stdin (event,
//! then context), the result as JSON on stdout. Exit code 64 means the entry
//! point does not exist and 65 that the module failed to load.
//!
//! Python and Node bootstraps also take a trailing `--check`: load the module,
//! look the entry point up, and exit without reading stdin. Shell scripts
//! dispatch on their own first argument, so they are only syntax-checked.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::routing::HandlerRef;

pub const EXIT_ENTRY_POINT_NOT_FOUND: i32 = 64;
pub const EXIT_IMPORT_FAILED: i32 = 65;

/// Trailing bootstrap argument selecting load-only mode.
pub const CHECK_FLAG: &str = "--check";

const PYTHON_BOOTSTRAP: &str = r#"
import importlib.util, json, os, sys, time, types
path, entry = sys.argv[1], sys.argv[2]
out, sys.stdout = sys.stdout, sys.stderr
sys.path.insert(0, os.getcwd())
try:
    spec = importlib.util.spec_from_file_location(os.path.splitext(os.path.basename(path))[0], path)
    module = importlib.util.module_from_spec(spec)
    spec.loader.exec_module(module)
except BaseException as exc:
    print("import failed: %r" % (exc,), file=sys.stderr)
    sys.exit(65)
fn = getattr(module, entry, None)
if not callable(fn):
    sys.exit(64)
if sys.argv[3:] == ["--check"]:
    sys.exit(0)
event = json.loads(sys.stdin.readline() or "null")
raw = json.loads(sys.stdin.readline() or "{}")
deadline = raw.get("deadlineMs")
context = types.SimpleNamespace(
    aws_request_id=raw.get("requestId"),
    function_name=raw.get("functionName"),
    get_remaining_time_in_millis=lambda: max(0, deadline - int(time.time() * 1000)) if deadline else 0,
)
result = fn(event, context)
out.write(json.dumps(result))
out.flush()
"#;

const NODE_BOOTSTRAP: &str = r#"
const fs = require('fs');
const { pathToFileURL } = require('url');
const write = process.stdout.write.bind(process.stdout);
console.log = console.info = console.debug = (...args) => console.error(...args);
const [file, entry, mode] = process.argv.slice(1);
(async () => {
  let mod;
  try {
    mod = await import(pathToFileURL(file).href);
  } catch (err) {
    console.error('import failed:', err);
    process.exit(65);
  }
  const fn = mod[entry] ?? (mod.default && mod.default[entry]);
  if (typeof fn !== 'function') process.exit(64);
  if (mode === '--check') process.exit(0);
  const lines = fs.readFileSync(0, 'utf8').split('\n');
  const event = JSON.parse(lines[0] || 'null');
  const raw = JSON.parse(lines[1] || '{}');
  const context = {
    awsRequestId: raw.requestId,
    functionName: raw.functionName,
    getRemainingTimeInMillis: () => (raw.deadlineMs ? Math.max(0, raw.deadlineMs - Date.now()) : 0),
  };
  const result = await fn(event, context);
  write(JSON.stringify(result === undefined ? null : result));
})().catch((err) => {
  console.error(err);
  process.exit(1);
});
"#;

/// How a located handler file is run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Runtime {
    Python,
    Node,
    Shell,
    /// Executed directly.
    Executable,
}

impl Runtime {
    /// Candidate extensions, in lookup order. Empty means no extension.
    const CANDIDATES: [(&'static str, Runtime); 5] = [
        ("py", Runtime::Python),
        ("js", Runtime::Node),
        ("mjs", Runtime::Node),
        ("sh", Runtime::Shell),
        ("", Runtime::Executable),
    ];

    /// Find the module file for `handler` under `code_location`.
    pub fn locate(code_location: &Path, handler: &HandlerRef) -> Option<(Runtime, PathBuf)> {
        let base = code_location.join(handler.module_path());
        Self::CANDIDATES.iter().find_map(|(extension, runtime)| {
            let candidate = if extension.is_empty() {
                base.clone()
            } else {
                base.with_extension(extension)
            };
            candidate.is_file().then_some((*runtime, candidate))
        })
    }

    /// Every path [`locate`](Self::locate) would try, for error messages.
    pub fn candidates(code_location: &Path, handler: &HandlerRef) -> Vec<PathBuf> {
        let base = code_location.join(handler.module_path());
        Self::CANDIDATES
            .iter()
            .map(|(extension, _)| {
                if extension.is_empty() {
                    base.clone()
                } else {
                    base.with_extension(extension)
                }
            })
            .collect()
    }

    /// Command running `entry_point` of `file`.
    pub fn command(&self, file: &Path, entry_point: &str) -> Command {
        match self {
            Runtime::Python => {
                let mut command = Command::new("python3");
                command.arg("-c").arg(PYTHON_BOOTSTRAP).arg(file).arg(entry_point);
                command
            }
            Runtime::Node => {
                let mut command = Command::new("node");
                command.arg("-e").arg(NODE_BOOTSTRAP).arg(file).arg(entry_point);
                command
            }
            Runtime::Shell => {
                let mut command = Command::new("sh");
                command.arg(file).arg(entry_point);
                command
            }
            Runtime::Executable => {
                let mut command = Command::new(file);
                command.arg(entry_point);
                command
            }
        }
    }

    /// Command that loads `file` and looks up `entry_point` without invoking
    /// it. `None` when the runtime has nothing to check beyond the file.
    pub fn check_command(&self, file: &Path, entry_point: &str) -> Option<Command> {
        match self {
            Runtime::Python | Runtime::Node => {
                let mut command = self.command(file, entry_point);
                command.arg(CHECK_FLAG);
                Some(command)
            }
            Runtime::Shell => {
                let mut command = Command::new("sh");
                command.arg("-n").arg(file);
                Some(command)
            }
            Runtime::Executable => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Runtime::Python => "python3",
            Runtime::Node => "node",
            Runtime::Shell => "sh",
            Runtime::Executable => "executable",
        }
    }
}
