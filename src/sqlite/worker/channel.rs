use tokio::sync::oneshot;

use crate::error::WebSqlError;
use crate::results::ResultSet;
use crate::sqlite::params::Params;

pub(super) enum Command {
    Execute {
        sql: String,
        params: Params,
        respond_to: oneshot::Sender<Result<ResultSet, WebSqlError>>,
    },
    Export {
        respond_to: oneshot::Sender<Result<Vec<u8>, WebSqlError>>,
    },
    Shutdown,
}
