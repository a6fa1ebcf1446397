use bytes::{Buf, Bytes};

use crate::connection::{Connection, Phase, ProtocolEvent, QueryEnd};
use crate::error::Result;
use crate::io::{BufExt, ProtocolDecode};
use crate::protocol::{
    is_ok_packet, Capabilities, Column, EofPacket, ErrPacket, OkPacket, Row, Status,
};

// https://dev.mysql.com/doc/internals/en/com-query-response.html

impl Connection {
    /// Interpret one whole packet according to the current phase.
    ///
    /// Errors returned here are protocol desynchronization and are fatal to
    /// the connection; a well-formed ERR packet is not an error at this
    /// level, it becomes a [`ProtocolEvent::ServerError`].
    pub(crate) fn handle_packet(&mut self, payload: Bytes) -> Result<()> {
        if payload.is_empty() {
            return Err(err_protocol!("empty packet"));
        }

        match self.phase {
            Phase::CommandSent => self.on_command_response(payload),
            Phase::ReadColumns => self.on_column_packet(payload),
            Phase::ReadRows => self.on_row_packet(payload),

            phase => Err(err_protocol!("unexpected packet in phase {:?}", phase)),
        }
    }

    /// The first packet after COM_QUERY (or after a statement of a
    /// multi-statement command completed with more results pending).
    fn on_command_response(&mut self, mut payload: Bytes) -> Result<()> {
        match payload[0] {
            0xff => self.on_server_error(payload),

            0x00 | 0xfe => {
                let ok = OkPacket::decode_with(payload, self.stream.capabilities)?;

                self.finish_statement(QueryEnd {
                    affected_rows: ok.affected_rows,
                    last_insert_id: ok.last_insert_id,
                    warnings: ok.warnings,
                    status: ok.status,
                });

                Ok(())
            }

            // LOCAL INFILE request: decline by sending an empty packet, the
            // server then answers with OK or ERR
            0xfb => {
                self.stream.write_raw(&[]);
                self.stream.flush()
            }

            _ => {
                let count = payload.get_uint_lenenc()?;

                if count == 0 || payload.has_remaining() {
                    return Err(err_protocol!("malformed result set header"));
                }

                self.pending_columns = count;
                self.columns = Vec::with_capacity(usize::try_from(count).unwrap_or(0));
                self.phase = Phase::ReadColumns;

                Ok(())
            }
        }
    }

    fn on_column_packet(&mut self, payload: Bytes) -> Result<()> {
        if self.pending_columns > 0 {
            let column = Column::decode_with(payload, ())?;

            self.columns.push(column);
            self.pending_columns -= 1;

            if self.pending_columns == 0
                && self.stream.capabilities.contains(Capabilities::DEPRECATE_EOF)
            {
                self.begin_rows();
            }

            Ok(())
        } else {
            // legacy terminator between the column definitions and the rows
            let eof = EofPacket::decode_with(payload, self.stream.capabilities)?;
            self.status = eof.status;
            self.begin_rows();

            Ok(())
        }
    }

    fn on_row_packet(&mut self, payload: Bytes) -> Result<()> {
        match payload[0] {
            0xff => self.on_server_error(payload),

            0xfe if is_ok_packet(&payload, self.stream.capabilities) => {
                let end = if self.stream.capabilities.contains(Capabilities::DEPRECATE_EOF) {
                    let ok = OkPacket::decode_with(payload, self.stream.capabilities)?;

                    QueryEnd {
                        affected_rows: ok.affected_rows,
                        last_insert_id: ok.last_insert_id,
                        warnings: ok.warnings,
                        status: ok.status,
                    }
                } else {
                    let eof = EofPacket::decode_with(payload, self.stream.capabilities)?;

                    QueryEnd {
                        affected_rows: 0,
                        last_insert_id: 0,
                        warnings: eof.warnings,
                        status: eof.status,
                    }
                };

                self.finish_statement(end);

                Ok(())
            }

            _ => {
                let row = Row::decode_with(payload, self.column_count)?;
                self.events.push_back(ProtocolEvent::Row(row));

                Ok(())
            }
        }
    }

    fn begin_rows(&mut self) {
        let columns = std::mem::take(&mut self.columns);

        self.column_count = columns.len();
        self.events.push_back(ProtocolEvent::Columns(columns));
        self.phase = Phase::ReadRows;
    }

    fn finish_statement(&mut self, end: QueryEnd) {
        self.status = end.status;

        let more = end.status.contains(Status::MORE_RESULTS_EXISTS);

        self.events.push_back(ProtocolEvent::End(end));

        if more {
            // the next statement's response follows within the same command
            self.phase = Phase::CommandSent;
        } else {
            self.phase = Phase::Idle;
            self.deadline = None;
        }
    }

    fn on_server_error(&mut self, payload: Bytes) -> Result<()> {
        let error = ErrPacket::decode_with(payload, self.stream.capabilities)?.into_server_error();

        if self.options.print_error {
            log::error!("conn={} server error: {}", self.connection_id, error);
        }

        self.events.push_back(ProtocolEvent::ServerError(error));
        self.phase = Phase::Idle;
        self.deadline = None;

        Ok(())
    }
}
