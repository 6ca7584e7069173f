use crate::dns::fqdn;
use crate::dns::upstream::Upstream;
use crate::error::Error;
use crate::resolver::{Engine, Query, ResolutionOutcome, Response};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tracing::{debug, error, warn};
use trust_dns_server::authority::MessageResponseBuilder;
use trust_dns_server::client::op::{Header, MessageType, OpCode, ResponseCode};
use trust_dns_server::client::rr::{Name, RData, Record};
use trust_dns_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};

#[derive(Clone)]
pub struct Handler {
    engine: Engine,
    upstream: Arc<Upstream>,
    max_cname_depth: u8,
    local_addr: SocketAddr,
}

impl Handler {
    pub(super) fn new(
        engine: Engine,
        upstream: Arc<Upstream>,
        max_cname_depth: u8,
        local_addr: SocketAddr,
    ) -> Self {
        Handler {
            engine,
            upstream,
            max_cname_depth,
            local_addr,
        }
    }

    async fn dispatch_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response: R,
    ) -> Result<ResponseInfo, Error> {
        // If it isn't a query, return NOTIMPL.
        if request.op_code() != OpCode::Query || request.message_type() != MessageType::Query {
            return self.handle_notimpl(request, response).await;
        }

        let request_query = request.query();
        let query = Query::new(
            &request_query.name().to_string(),
            request_query.query_type(),
            u16::from(request_query.query_class()),
            request.src().to_string(),
            self.local_addr.to_string(),
        );
        debug!(
            "incoming query for {} ({}) from {}",
            query.name, query.rrtype, query.peer_address
        );

        match self.engine.resolve(&query, self.max_cname_depth) {
            ResolutionOutcome::Answered(responses) => {
                let authoritative = responses.iter().any(Response::is_authoritative);
                let records = self
                    .answer_records(request_query.name().into(), responses)
                    .await;
                self.send_records(request, response, records, authoritative)
                    .await
            }
            ResolutionOutcome::Escalate {
                name,
                rrtype,
                rrclass,
            } => {
                let records = self.upstream.query(&name, rrtype, rrclass).await;
                self.send_records(request, response, records, false).await
            }
            ResolutionOutcome::Empty => self.send_nxdomain(request, response).await,
        }
    }

    /// Encode resolved records, forwarding any escalation markers upstream and splicing the
    /// upstream answers in their place.
    async fn answer_records(&self, query_name: Name, responses: Vec<Response>) -> Vec<Record> {
        let mut owner = query_name;
        let mut records = Vec::with_capacity(responses.len());
        for response in responses {
            match response {
                Response::Escalate {
                    name,
                    rrtype,
                    rrclass,
                } => {
                    records.extend(self.upstream.query(&name, rrtype, rrclass).await);
                }
                response => records.extend(to_record(&mut owner, &response)),
            }
        }
        records
    }

    async fn handle_notimpl<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> Result<ResponseInfo, Error> {
        let response = MessageResponseBuilder::from_message_request(request);
        Ok(response_handle
            .send_response(response.error_msg(request.header(), ResponseCode::NotImp))
            .await?)
    }

    async fn send_records<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
        records: Vec<Record>,
        authoritative: bool,
    ) -> Result<ResponseInfo, Error> {
        if records.is_empty() {
            return self.send_nxdomain(request, response_handle).await;
        }
        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(authoritative);
        let builder = MessageResponseBuilder::from_message_request(request);
        let response = builder.build(header, records.iter(), &[], &[], &[]);
        Ok(response_handle.send_response(response).await?)
    }

    async fn send_nxdomain<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> Result<ResponseInfo, Error> {
        let builder = MessageResponseBuilder::from_message_request(request);
        let mut header = Header::response_from_request(request.header());
        header.set_response_code(ResponseCode::NXDomain);
        let response = builder.build_no_records(header);
        Ok(response_handle.send_response(response).await?)
    }
}

/// Encode one record owned by `owner`, or by its explicit owner if it has one. A CNAME moves
/// `owner` to its target so the records after it are owned by the name they answer for. Records
/// the wire format can't carry are skipped.
fn to_record(owner: &mut Name, response: &Response) -> Option<Record> {
    let rdata = match response {
        Response::A { ip, .. } => match ip.parse::<Ipv4Addr>() {
            Ok(addr) => RData::A(addr),
            Err(_) => {
                warn!("skipping A record for {owner} with invalid address \"{ip}\"");
                return None;
            }
        },
        Response::Aaaa { ip, .. } => match ip.parse::<Ipv6Addr>() {
            Ok(addr) => RData::AAAA(addr),
            Err(_) => {
                warn!("skipping AAAA record for {owner} with invalid address \"{ip}\"");
                return None;
            }
        },
        Response::Cname { target, .. } => match fqdn(target) {
            Ok(target) => RData::CNAME(target),
            Err(err) => {
                warn!("skipping CNAME record for {owner} with invalid target \"{target}\": {err}");
                return None;
            }
        },
        Response::Escalate { .. } => return None,
    };

    let record_owner = match response.owner().map(fqdn) {
        Some(Ok(explicit)) => explicit,
        Some(Err(err)) => {
            warn!("ignoring invalid owner for record of {owner}: {err}");
            owner.clone()
        }
        None => owner.clone(),
    };
    let ttl = response.ttl().unwrap_or_default();
    let record = Record::from_rdata(record_owner, ttl, rdata);
    if let Some(target) = response.cname_target().and_then(|target| fqdn(target).ok()) {
        *owner = target;
    }
    Some(record)
}

#[async_trait::async_trait]
impl RequestHandler for Handler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> ResponseInfo {
        match self.dispatch_request(request, response_handle).await {
            Ok(info) => info,
            Err(error) => {
                error!("error in RequestHandler: {:?}", error);
                let mut header = Header::new();
                header.set_response_code(ResponseCode::ServFail);
                header.into()
            }
        }
    }
}
