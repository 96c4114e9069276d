//! DBC database generation.
//!
//! Renders the configured message types into a CAN database document so the
//! frames on the wire stay inspectable with standard tooling (candump,
//! cantools). One `BO_` per message type, one `SG_` per signal.

use std::fmt::Write;

use crate::frame::pgn_to_can_id;
use crate::message::MessageDef;

/// DBC extended-frame flag on the message id.
const EXTENDED_FLAG: u32 = 0x8000_0000;

/// Placeholder node name for the single controller.
const MASTER_NODE: &str = "MASTER";

/// Frame id used in the `BO_` line: the extended-flagged CAN id built from
/// the message's priority and PGN with source address 0. PDU-1 PGNs keep a
/// zero destination byte; concrete addresses are applied at encode time.
pub fn dbc_frame_id(msg: &MessageDef) -> u32 {
    EXTENDED_FLAG | pgn_to_can_id(msg.pgn, msg.priority, 0x00, 0x00)
}

/// Generate a DBC document covering the given message types.
pub fn generate_dbc(messages: &[MessageDef]) -> String {
    let mut out = String::new();

    out.push_str("VERSION \"\"\n\n\nNS_ :\n\nBS_:\n\n");
    let _ = writeln!(out, "BU_: {MASTER_NODE}");

    for msg in messages {
        out.push('\n');
        let _ = writeln!(
            out,
            "BO_ {} {}: 8 {MASTER_NODE}",
            dbc_frame_id(msg),
            msg.dbc_name
        );
        for sig in &msg.signals {
            let sign = if sig.signed { '-' } else { '+' };
            let (min, max) = sig.value_range();
            let _ = writeln!(
                out,
                " SG_ {} : {}|{}@1{sign} ({},{}) [{}|{}] \"{}\" {MASTER_NODE}",
                sig.dbc_name, sig.start_bit, sig.size, sig.scale, sig.offset, min, max, sig.unit
            );
        }
    }

    out
}
