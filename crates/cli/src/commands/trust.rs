//! `scout trust {list, remove, import}`: local trust-store administration
//! (spec.md §4.2). These act directly on the on-disk trust directory —
//! no RPC round-trip, since trust decisions are a property of this
//! machine's identity, not of a running daemon.

use serde::Serialize;

use scout::{ScoutPaths, TrustStore};

use crate::cli::{ConnectionArgs, TrustCommand};
use crate::error::Result;
use crate::output::{print_result, OutputFormat, ResultBuilder};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TrustedDeviceData {
	device_id: String,
	trusted_at: u64,
}

fn store(conn: &ConnectionArgs) -> Result<TrustStore> {
	let paths = match &conn.data_dir {
		Some(root) => ScoutPaths::with_root(root.clone()),
		None => ScoutPaths::resolve()?,
	};
	paths.ensure()?;
	Ok(TrustStore::new(paths.trusted_dir()))
}

pub async fn run(action: TrustCommand, conn: &ConnectionArgs, format: OutputFormat) -> Result<()> {
	match action {
		TrustCommand::List => list(conn, format),
		TrustCommand::Remove { device_id } => remove(conn, format, &device_id),
		TrustCommand::Import { device_id, cert_der_path } => import(conn, format, &device_id, &cert_der_path),
	}
}

fn list(conn: &ConnectionArgs, format: OutputFormat) -> Result<()> {
	let devices = store(conn)?
		.list()?
		.into_iter()
		.map(|d| TrustedDeviceData {
			device_id: d.device_id,
			trusted_at: d.trusted_at,
		})
		.collect::<Vec<_>>();
	print_result(&ResultBuilder::new("trust.list").data(devices).build(), format);
	Ok(())
}

fn remove(conn: &ConnectionArgs, format: OutputFormat, device_id: &str) -> Result<()> {
	store(conn)?.remove(device_id)?;
	print_result(&ResultBuilder::<()>::new("trust.remove").build(), format);
	Ok(())
}

fn import(conn: &ConnectionArgs, format: OutputFormat, device_id: &str, cert_der_path: &std::path::Path) -> Result<()> {
	let cert_der = std::fs::read(cert_der_path)?;
	store(conn)?.admin_import(device_id, &cert_der)?;
	print_result(&ResultBuilder::<()>::new("trust.import").build(), format);
	Ok(())
}
