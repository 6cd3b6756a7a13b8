//! Node identity and connection metadata.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Service ports are fixed offsets from a node's base (protobuf) port.
/// The HTTP/admin listener sits one offset block above.
pub const HTTP_PORT_OFFSET: u16 = 10_000;

/// Identity and connection metadata for one backend instance.
///
/// Created from static topology at configuration time and immutable for the
/// process lifetime; nodes are only ever logically started and stopped, never
/// destroyed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    name: String,
    host: String,
    base_port: u16,
    work_dir: PathBuf,
}

impl Node {
    /// Creates a node description.
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        base_port: u16,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            base_port,
            work_dir: work_dir.into(),
        }
    }

    /// Unique node name, used to address control scripts.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Base (protobuf) port all other service ports derive from.
    pub fn base_port(&self) -> u16 {
        self.base_port
    }

    /// Derived HTTP/admin port.
    pub fn http_port(&self) -> u16 {
        self.base_port + HTTP_PORT_OFFSET
    }

    /// Directory holding the node's deployed artifacts.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Path of the node's deployed configuration file.
    pub fn conf_path(&self) -> PathBuf {
        self.work_dir.join("etc").join("store.conf")
    }

    /// Discovers a listener port from the node's deployed configuration.
    ///
    /// Scans the config file for `directive` and parses the port after the
    /// final `:` on that line. The static topology port could be returned
    /// instead, but reading back the configured value catches deployment
    /// drift. Returns `Ok(None)` when the directive is absent or carries no
    /// parseable port; callers must check.
    pub fn discover_port(&self, directive: &str) -> io::Result<Option<u16>> {
        let text = fs::read_to_string(self.conf_path())?;

        for line in text.lines() {
            if line.contains(directive) {
                let port = line
                    .rsplit(':')
                    .next()
                    .and_then(|tail| tail.trim().parse().ok());
                return Ok(port);
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn node_with_conf(temp: &TempDir, conf: &str) -> Node {
        let work_dir = temp.path().join("devrel_devA");
        fs::create_dir_all(work_dir.join("etc")).unwrap();
        fs::write(work_dir.join("etc").join("store.conf"), conf).unwrap();
        Node::new("devA", "127.0.0.1", 5200, work_dir)
    }

    #[test]
    fn derived_ports() {
        let node = Node::new("devA", "127.0.0.1", 5200, "/tmp/r/devrel_devA");
        assert_eq!(node.base_port(), 5200);
        assert_eq!(node.http_port(), 15200);
    }

    #[test]
    fn discovers_listener_port_from_conf() {
        let temp = TempDir::new().unwrap();
        let node = node_with_conf(
            &temp,
            "ring_size = 64\nlistener.protobuf.internal = 127.0.0.1:5201\n",
        );

        let port = node.discover_port("listener.protobuf.internal").unwrap();
        assert_eq!(port, Some(5201));
    }

    #[test]
    fn missing_directive_yields_none() {
        let temp = TempDir::new().unwrap();
        let node = node_with_conf(&temp, "ring_size = 64\n");

        let port = node.discover_port("listener.protobuf.internal").unwrap();
        assert_eq!(port, None);
    }

    #[test]
    fn unparseable_port_yields_none() {
        let temp = TempDir::new().unwrap();
        let node = node_with_conf(&temp, "listener.protobuf.internal = off\n");

        let port = node.discover_port("listener.protobuf.internal").unwrap();
        assert_eq!(port, None);
    }

    #[test]
    fn missing_conf_file_is_an_io_error() {
        let node = Node::new("devA", "127.0.0.1", 5200, "/nonexistent/devrel");
        assert!(node.discover_port("listener.protobuf.internal").is_err());
    }
}
