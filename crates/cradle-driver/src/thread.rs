//! 后台线程工具

use std::thread::{JoinHandle, spawn};
use std::time::Duration;

/// 带超时的 join
///
/// 标准库的 `JoinHandle::join` 没有超时参数，卡死的后台线程会让关闭流程无限阻塞。
/// 这里由看门狗线程代为 join，调用方只等待有限时间。
pub trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();

        spawn(move || {
            let result = self.join();
            // 接收端可能已经超时退出
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                // 看门狗线程继续等待，进程退出时由操作系统回收
                Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "Thread join timeout",
                )))
            },
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}
