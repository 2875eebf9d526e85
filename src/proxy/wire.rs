//! The words of the proxy handshake protocol.
//!
//! The handshake is line based, one token or argument per line. After a
//! successful connect the socket stops being line based and carries raw
//! device frames instead.

/// Ask the server to shut down entirely.
pub const STOP_SERVER: &str = "ardulink:networkproxyserver:stop_server";

/// Ask for the ports the server can open.
pub const GET_PORT_LIST: &str = "ardulink:networkproxyserver:get_port_list";

/// Prefixes the port count in the port list reply.
pub const NUMBER_OF_PORTS: &str = "NUMBER_OF_PORTS";

/// Ask to open a port. Followed by two lines: port name and baud rate.
pub const CONNECT: &str = "ardulink:networkproxyserver:connect";

/// Positive reply to a connect request.
pub const OK: &str = "OK";

/// Negative reply to a connect request.
pub const KO: &str = "KO";
