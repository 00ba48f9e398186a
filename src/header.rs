// File header decoding: magic validation and board/channel discovery.

use tracing::info;

use crate::cursor::ByteCursor;
use crate::{DrsError, Result, N_BINS};

pub const FILE_MAGIC: &[u8; 4] = b"DRS2";
pub const TIME_MAGIC: &[u8; 4] = b"TIME";
pub const BOARD_MARKER: &[u8; 2] = b"B#";
pub const CHANNEL_MARKER: &[u8; 3] = b"C00";

/// Per-channel timing calibration: the width of each of the 1024 bins.
///
/// Widths are fixed for the whole file; the event decoder rotates them by the
/// per-event trigger cell when reconstructing the time axis.
#[derive(Clone, Debug)]
pub struct ChannelCalibration {
    /// Channel number as written in the file (1-4).
    pub channel: u8,
    /// Exactly [`N_BINS`] bin widths.
    pub bin_widths: Vec<f32>,
}

/// One digitizer board and its channels, in file order.
#[derive(Clone, Debug)]
pub struct BoardDescriptor {
    pub board_id: u16,
    pub channels: Vec<ChannelCalibration>,
}

impl BoardDescriptor {
    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }
}

fn expect_magic(cur: &mut ByteCursor, magic: &[u8]) -> Result<()> {
    let found = cur.read_bytes(magic.len())?;
    if found != magic {
        return Err(DrsError::MalformedHeader {
            expected: String::from_utf8_lossy(magic).into_owned(),
            found: String::from_utf8_lossy(found).into_owned(),
        });
    }
    Ok(())
}

/// Decode the file header and discover the board/channel topology.
///
/// The cursor is left positioned at the first event record. Only single-board
/// files are supported; zero or multiple board sections is
/// [`DrsError::UnsupportedTopology`], a board without channels is
/// [`DrsError::EmptyBoard`].
pub fn decode_header(cur: &mut ByteCursor) -> Result<BoardDescriptor> {
    expect_magic(cur, FILE_MAGIC)?;
    expect_magic(cur, TIME_MAGIC)?;

    let mut boards: Vec<BoardDescriptor> = Vec::new();
    while cur.eat_tag(BOARD_MARKER) {
        let board_id = cur.read_u16()?;
        info!(board_id, "found board");

        let mut channels = Vec::new();
        while cur.eat_tag(CHANNEL_MARKER) {
            let digit = cur.read_bytes(1)?[0];
            let channel = match digit {
                b'1'..=b'4' => digit - b'0',
                _ => {
                    return Err(DrsError::MalformedHeader {
                        expected: "channel digit 1-4".to_string(),
                        found: (digit as char).to_string(),
                    })
                }
            };
            info!(channel, "found channel");
            let bin_widths = cur.read_f32_array(N_BINS)?;
            channels.push(ChannelCalibration { channel, bin_widths });
        }

        if channels.is_empty() {
            return Err(DrsError::EmptyBoard(board_id));
        }
        boards.push(BoardDescriptor { board_id, channels });
    }

    if boards.len() != 1 {
        return Err(DrsError::UnsupportedTopology(boards.len()));
    }
    Ok(boards.remove(0))
}
