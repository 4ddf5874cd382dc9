//! Sinal de parada do Gateway.
//!
//! Um channel crossbeam sem capacidade onde nada é enviado: desconectar o
//! lado [`StopHandle`] é o próprio sinal, visto por todos os
//! [`StopToken`] clonados.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

/// Lado que dispara a parada. Dropar o handle também para o Gateway.
#[derive(Debug)]
pub struct StopHandle {
    _tx: Sender<()>,
}

impl StopHandle {
    pub fn stop(self) {
        drop(self);
    }
}

/// Lado observado pelo loop de polling.
#[derive(Debug, Clone)]
pub struct StopToken {
    rx: Receiver<()>,
}

/// Cria o par handle/token.
pub fn stop_channel() -> (StopHandle, StopToken) {
    let (tx, rx) = bounded(0);
    (StopHandle { _tx: tx }, StopToken { rx })
}

impl StopToken {
    pub fn is_stopped(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Espera até `timeout` ou até a parada. Retorna `true` se parou.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        !matches!(self.rx.recv_timeout(timeout), Err(RecvTimeoutError::Timeout))
    }
}
