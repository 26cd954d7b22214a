//! # 受信者の決定
//!
//! ドメインイベントごとに、通知を受け取るユーザーを決める。
//! 副作用を持たない関数の集まりで、部署やプロファイルの取得は呼び出し側が行う。
//!
//! | イベント | 受信者 |
//! |---|---|
//! | チケット起票 | 部署の責任者（未設定なら通知しない） |
//! | コメント投稿 | 起票者（本人のコメントなら通知しない） |
//! | チケット解決 | 起票者（未解決 → 解決済みの遷移時のみ） |
//! | 部署の付け替え | 新しい部署の責任者（起票者本人なら通知しない） |
//! | ユーザー登録 | 組織の全管理者 |
//! | 承認・プロファイル更新 | 本人 |

use ticketdesk_domain::{
    ticket::{Department, Ticket, TicketChange},
    user::{UserId, UserProfile},
};

/// チケット起票時の受信者
pub fn for_ticket_created(department: Option<&Department>) -> Option<UserId> {
    department.and_then(|d| d.supervisor_id.clone())
}

/// コメント投稿時の受信者
pub fn for_ticket_commented(ticket: &Ticket, commenter_id: &UserId) -> Option<UserId> {
    (ticket.reported_by() != commenter_id).then(|| ticket.reported_by().clone())
}

/// チケット更新時の解決通知の受信者
pub fn for_ticket_resolved(ticket: &Ticket, change: &TicketChange) -> Option<UserId> {
    change
        .is_resolution()
        .then(|| ticket.reported_by().clone())
}

/// 部署の付け替え時の受信者
pub fn for_ticket_reassigned(ticket: &Ticket, department: Option<&Department>) -> Option<UserId> {
    department
        .and_then(|d| d.supervisor_id.clone())
        .filter(|supervisor| supervisor != ticket.reported_by())
}

/// ユーザー登録時の受信者
///
/// `admins` は組織の管理者として取得したプロファイル。
pub fn for_user_registered(admins: &[UserProfile]) -> Vec<UserId> {
    admins
        .iter()
        .filter(|admin| admin.is_admin())
        .map(|admin| admin.id().clone())
        .collect()
}
