use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const OUTBOUND_HEADER: &str = "INVNUM,MRN,VisitNumber,Location,CodifyComments,Reason,RetrievalStatus,RetrievalDescription,CreatedDate,BOTRequestDate,LastModifiedDate,RecordAttemptCount";

pub fn temp_dir(prefix: &str) -> PathBuf {
    let unique = format!("{prefix}_{}_{}", std::process::id(), Uuid::new_v4());
    let dir = std::env::temp_dir().join(unique);
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

pub fn outbound_csv(dir: &Path, name: &str, rows: &[&str]) -> PathBuf {
    let mut body = String::from(OUTBOUND_HEADER);
    body.push('\n');
    for row in rows {
        body.push_str(row);
        body.push('\n');
    }
    let path = dir.join(name);
    fs::write(&path, body).expect("write outbound csv fixture");
    path
}
