//! `scout.v1.Pairing` service implementation: runs on its own
//! unauthenticated listener (spec.md §4.3, §9).

use tonic::{Request, Response, Status};

use scout_protocol::pb;

use crate::pairing::PairingService as PairingLogic;
use crate::rpc::error_map::to_status;

pub struct PairingRpcService {
	logic: PairingLogic,
}

impl PairingRpcService {
	pub fn new(logic: PairingLogic) -> Self {
		Self { logic }
	}
}

#[tonic::async_trait]
impl pb::pairing_server::Pairing for PairingRpcService {
	async fn pair(&self, request: Request<pb::PairRequest>) -> Result<Response<pb::PairResponse>, Status> {
		let req = request.into_inner();
		let result = self
			.logic
			.pair(&req.client_device_id, &req.client_cert_der)
			.map_err(to_status)?;

		Ok(Response::new(pb::PairResponse {
			server_device_id: result.server_device_id,
			server_cert_der: result.server_cert_der,
		}))
	}
}
