//! Loopback DNS responder for the synthetic TLD.
//!
//! Every name under the zone resolves to `127.0.0.1`; only A queries get an
//! answer record, everything else in-zone gets an authoritative empty reply.
//! Queries outside the zone are refused with SERVFAIL so misdirected
//! resolvers fail over instead of caching bogus answers.

use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;

use anyhow::{Context, Result};
use hickory_proto::op::{Message, MessageType, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, warn};

use pv_core::paths::DNS_PORT;

/// Answer TTL in seconds.
const ANSWER_TTL: u32 = 60;

/// Resolves `*.<tld>` A queries to `127.0.0.1`.
pub struct DnsServer {
    zone: Name,
    socket: UdpSocket,
}

impl DnsServer {
    /// Binds on `127.0.0.1:10053`.
    pub async fn bind(tld: &str) -> Result<Self> {
        Self::bind_addr(tld, SocketAddr::from((Ipv4Addr::LOCALHOST, DNS_PORT))).await
    }

    /// Binds on an explicit address; port `0` picks an ephemeral one.
    pub async fn bind_addr(tld: &str, addr: SocketAddr) -> Result<Self> {
        let zone =
            Name::from_str(&format!("{tld}.")).with_context(|| format!("invalid TLD {tld:?}"))?;
        let socket = UdpSocket::bind(addr)
            .await
            .with_context(|| format!("cannot bind DNS socket on {addr}"))?;
        Ok(Self { zone, socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Serves queries until `shutdown` flips to `true` (or its sender goes
    /// away). Returns `Err` only on socket failure.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut buf = [0u8; 512];
        loop {
            tokio::select! {
                received = self.socket.recv_from(&mut buf) => {
                    let (len, peer) = received.context("DNS socket receive failed")?;
                    if let Some(reply) = self.handle_packet(&buf[..len]) {
                        if let Err(err) = self.socket.send_to(&reply, peer).await {
                            warn!("cannot send DNS reply to {peer}: {err}");
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn handle_packet(&self, packet: &[u8]) -> Option<Vec<u8>> {
        let request = match Message::from_vec(packet) {
            Ok(request) => request,
            Err(err) => {
                debug!("dropping unparseable DNS packet: {err}");
                return None;
            }
        };

        let mut response = Message::new();
        response
            .set_id(request.id())
            .set_message_type(MessageType::Response)
            .set_op_code(request.op_code())
            .set_recursion_desired(request.recursion_desired())
            .set_authoritative(true);
        response.add_queries(request.queries().to_vec());

        let in_zone = request
            .queries()
            .iter()
            .all(|query| self.zone.zone_of(query.name()));
        if !in_zone {
            response.set_response_code(ResponseCode::ServFail);
            return response.to_vec().ok();
        }

        for query in request.queries() {
            if query.query_type() == RecordType::A {
                let rdata = RData::A(A::new(127, 0, 0, 1));
                response.add_answer(Record::from_rdata(
                    query.name().clone(),
                    ANSWER_TTL,
                    rdata,
                ));
            }
        }

        response.to_vec().ok()
    }
}

#[cfg(test)]
mod tests {
    use hickory_proto::op::{OpCode, Query};

    use super::*;

    async fn spawn_server(tld: &str) -> (SocketAddr, watch::Sender<bool>) {
        let server = DnsServer::bind_addr(tld, "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(server.serve(shutdown_rx));
        (addr, shutdown_tx)
    }

    async fn query(addr: SocketAddr, name: &str, qtype: RecordType) -> Message {
        let mut request = Message::new();
        request
            .set_id(4242)
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(true);
        request.add_query(Query::query(Name::from_str(name).unwrap(), qtype));

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client
            .send_to(&request.to_vec().unwrap(), addr)
            .await
            .unwrap();

        let mut buf = [0u8; 512];
        let (len, _) = client.recv_from(&mut buf).await.unwrap();
        Message::from_vec(&buf[..len]).unwrap()
    }

    #[tokio::test]
    async fn any_subdomain_resolves_to_loopback() {
        let (addr, _shutdown) = spawn_server("test").await;

        let response = query(addr, "myapp.test.", RecordType::A).await;
        assert_eq!(response.id(), 4242);
        assert!(response.authoritative());
        assert_eq!(response.response_code(), ResponseCode::NoError);
        assert_eq!(response.answers().len(), 1);

        let answer = &response.answers()[0];
        assert_eq!(answer.name(), &Name::from_str("myapp.test.").unwrap());
        assert_eq!(answer.ttl(), 60);
        assert_eq!(answer.data(), Some(&RData::A(A::new(127, 0, 0, 1))));
    }

    #[tokio::test]
    async fn deep_subdomains_and_the_apex_resolve() {
        let (addr, _shutdown) = spawn_server("test").await;

        let deep = query(addr, "a.b.myapp.test.", RecordType::A).await;
        assert_eq!(deep.answers().len(), 1);

        let apex = query(addr, "test.", RecordType::A).await;
        assert_eq!(apex.answers().len(), 1);
    }

    #[tokio::test]
    async fn non_a_queries_get_empty_authoritative_reply() {
        let (addr, _shutdown) = spawn_server("test").await;

        let response = query(addr, "myapp.test.", RecordType::AAAA).await;
        assert_eq!(response.response_code(), ResponseCode::NoError);
        assert!(response.authoritative());
        assert!(response.answers().is_empty());
        // The question section is echoed back.
        assert_eq!(response.queries().len(), 1);
    }

    #[tokio::test]
    async fn out_of_zone_queries_are_refused() {
        let (addr, _shutdown) = spawn_server("test").await;

        let response = query(addr, "example.com.", RecordType::A).await;
        assert_eq!(response.response_code(), ResponseCode::ServFail);
        assert!(response.answers().is_empty());
    }

    #[tokio::test]
    async fn shutdown_stops_the_serve_loop() {
        let server = DnsServer::bind_addr("test", "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(server.serve(shutdown_rx));

        shutdown_tx.send(true).unwrap();
        let result = tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
