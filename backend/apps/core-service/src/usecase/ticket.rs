//! # チケットユースケース
//!
//! チケットの起票・更新・コメント投稿を実装する。
//!
//! いずれも主処理（チケット・コメントの保存）をコミットしてから通知する。
//! 通知の失敗はログに残すだけで、ユースケースの結果には影響しない。

use std::sync::Arc;

use ticketdesk_domain::{
    clock::Clock,
    notification::{NotificationEvent, NotificationPayload},
    tenant::TenantId,
    ticket::{
        CommentBody,
        Department,
        NewTicket,
        NewTicketComment,
        Ticket,
        TicketComment,
        TicketCommentId,
        TicketId,
        TicketPriority,
        TicketTitle,
        TicketUpdate,
    },
    user::{UserId, UserProfile},
};
use ticketdesk_infra::{
    db::TransactionManager,
    repository::{
        DepartmentRepository,
        TicketCommentRepository,
        TicketRepository,
        UserProfileRepository,
    },
};
use ticketdesk_shared::{
    event_log::{error as log_error, event},
    log_business_event,
};

use crate::{
    error::CoreError,
    usecase::{
        helpers::{FindResultExt, begin_tx, commit_tx},
        notification::{NotificationDispatcher, recipient},
    },
};

/// チケット起票の入力
#[derive(Debug, Clone)]
pub struct CreateTicketInput {
    pub tenant_id:   TenantId,
    pub reporter_id: UserId,
    pub title:       String,
    pub description: String,
    pub priority:    TicketPriority,
    pub is_public:   bool,
    pub department:  String,
    pub category:    String,
}

/// チケット更新の入力
#[derive(Debug, Clone)]
pub struct UpdateTicketInput {
    pub tenant_id: TenantId,
    pub ticket_id: TicketId,
    pub actor_id:  UserId,
    pub update:    TicketUpdate,
}

/// コメント投稿の入力
#[derive(Debug, Clone)]
pub struct PostCommentInput {
    pub tenant_id: TenantId,
    pub ticket_id: TicketId,
    pub author_id: UserId,
    pub body:      String,
}

/// チケットユースケースの依存
pub struct TicketUseCaseDeps {
    pub ticket_repo:     Arc<dyn TicketRepository>,
    pub comment_repo:    Arc<dyn TicketCommentRepository>,
    pub department_repo: Arc<dyn DepartmentRepository>,
    pub profile_repo:    Arc<dyn UserProfileRepository>,
    pub tx_manager:      Arc<dyn TransactionManager>,
    pub clock:           Arc<dyn Clock>,
    pub dispatcher:      Arc<NotificationDispatcher>,
}

/// チケットユースケース
pub struct TicketUseCaseImpl {
    deps: TicketUseCaseDeps,
}

impl TicketUseCaseImpl {
    pub fn new(deps: TicketUseCaseDeps) -> Self {
        Self { deps }
    }

    /// チケットを起票する
    ///
    /// ## 処理フロー
    ///
    /// 1. 起票者のプロファイルを取得
    /// 2. 件名のバリデーション
    /// 3. チケットを保存してコミット
    /// 4. 担当部署の責任者に通知
    pub async fn create_ticket(&self, input: CreateTicketInput) -> Result<Ticket, CoreError> {
        let reporter = self
            .find_member(&input.reporter_id, &input.tenant_id)
            .await?;
        let title = TicketTitle::new(input.title)?;

        let ticket = Ticket::new(NewTicket {
            id: TicketId::new(),
            tenant_id: input.tenant_id,
            title,
            description: input.description,
            priority: input.priority,
            is_public: input.is_public,
            department: input.department,
            category: input.category,
            reported_by: reporter.id().clone(),
            reported_by_name: reporter.name().as_str().to_string(),
            now: self.deps.clock.now(),
        });

        let mut tx = begin_tx(self.deps.tx_manager.as_ref()).await?;
        self.deps.ticket_repo.insert(&mut tx, &ticket).await?;
        commit_tx(tx).await?;

        log_business_event!(
            event.category = event::category::TICKET,
            event.action = event::action::TICKET_CREATED,
            event.entity_type = event::entity_type::TICKET,
            event.entity_id = %ticket.id(),
            event.actor_id = %reporter.id(),
            event.tenant_id = %ticket.tenant_id(),
            event.result = event::result::SUCCESS,
            "チケット起票"
        );

        let department = self.find_department(&ticket).await;
        if let Some(recipient) = recipient::for_ticket_created(department.as_ref()) {
            self.deps
                .dispatcher
                .notify(NotificationEvent::new(
                    recipient,
                    ticket.tenant_id().clone(),
                    NotificationPayload::TicketCreated {
                        ticket_id:    ticket.id().clone(),
                        ticket_title: ticket.title().as_str().to_string(),
                    },
                ))
                .await;
        }

        Ok(ticket)
    }

    /// チケットを更新する
    ///
    /// 更新できるのは同じ組織の管理者と責任者のみ。
    ///
    /// 更新前後の差分から通知を決める。
    /// - 部署が変わった: 新しい部署の責任者に `TicketAssigned`
    /// - 未解決から解決済みになった: 起票者に `TicketResolved`
    pub async fn update_ticket(&self, input: UpdateTicketInput) -> Result<Ticket, CoreError> {
        let actor = self.find_member(&input.actor_id, &input.tenant_id).await?;
        if !actor.can_manage_tickets() {
            return Err(CoreError::Forbidden(
                "チケットを更新できるのは管理者と責任者のみです".to_string(),
            ));
        }
        let ticket = self
            .deps
            .ticket_repo
            .find_by_id(&input.ticket_id, &input.tenant_id)
            .await
            .or_not_found("チケット")?;

        let (updated, change) = ticket.apply(input.update, self.deps.clock.now());

        let mut tx = begin_tx(self.deps.tx_manager.as_ref()).await?;
        self.deps.ticket_repo.update(&mut tx, &updated).await?;
        commit_tx(tx).await?;

        log_business_event!(
            event.category = event::category::TICKET,
            event.action = event::action::TICKET_UPDATED,
            event.entity_type = event::entity_type::TICKET,
            event.entity_id = %updated.id(),
            event.actor_id = %actor.id(),
            event.tenant_id = %updated.tenant_id(),
            event.result = event::result::SUCCESS,
            ticket.status = %updated.status(),
            "チケット更新"
        );

        let mut events = Vec::new();
        if change.reassigned_department().is_some() {
            let department = self.find_department(&updated).await;
            if let Some(recipient) = recipient::for_ticket_reassigned(&updated, department.as_ref())
            {
                events.push(NotificationEvent::new(
                    recipient,
                    updated.tenant_id().clone(),
                    NotificationPayload::TicketAssigned {
                        ticket_id:    updated.id().clone(),
                        ticket_title: updated.title().as_str().to_string(),
                    },
                ));
            }
        }
        if let Some(recipient) = recipient::for_ticket_resolved(&updated, &change) {
            events.push(NotificationEvent::new(
                recipient,
                updated.tenant_id().clone(),
                NotificationPayload::TicketResolved {
                    ticket_id:    updated.id().clone(),
                    ticket_title: updated.title().as_str().to_string(),
                },
            ));
        }
        self.deps.dispatcher.notify_all(events).await;

        Ok(updated)
    }

    /// チケットにコメントを投稿する
    ///
    /// 起票者以外のコメントであれば起票者に通知する。
    pub async fn post_comment(&self, input: PostCommentInput) -> Result<TicketComment, CoreError> {
        let ticket = self
            .deps
            .ticket_repo
            .find_by_id(&input.ticket_id, &input.tenant_id)
            .await
            .or_not_found("チケット")?;
        let author = self.find_member(&input.author_id, &input.tenant_id).await?;
        let body = CommentBody::new(input.body)?;

        let comment = TicketComment::new(NewTicketComment {
            id: TicketCommentId::new(),
            ticket_id: ticket.id().clone(),
            author_id: author.id().clone(),
            author_name: author.name().as_str().to_string(),
            body,
            now: self.deps.clock.now(),
        });

        let mut tx = begin_tx(self.deps.tx_manager.as_ref()).await?;
        self.deps.comment_repo.insert(&mut tx, &comment).await?;
        commit_tx(tx).await?;

        log_business_event!(
            event.category = event::category::TICKET,
            event.action = event::action::TICKET_COMMENTED,
            event.entity_type = event::entity_type::TICKET_COMMENT,
            event.entity_id = %comment.id(),
            event.actor_id = %author.id(),
            event.tenant_id = %ticket.tenant_id(),
            event.result = event::result::SUCCESS,
            "コメント投稿"
        );

        if let Some(recipient) = recipient::for_ticket_commented(&ticket, author.id()) {
            self.deps
                .dispatcher
                .notify(NotificationEvent::new(
                    recipient,
                    ticket.tenant_id().clone(),
                    NotificationPayload::TicketComment {
                        ticket_id:      ticket.id().clone(),
                        ticket_title:   ticket.title().as_str().to_string(),
                        commenter_name: comment.author_name().to_string(),
                    },
                ))
                .await;
        }

        Ok(comment)
    }

    /// テナントに所属するユーザーを取得する
    async fn find_member(
        &self,
        user_id: &UserId,
        tenant_id: &TenantId,
    ) -> Result<UserProfile, CoreError> {
        let profile = self
            .deps
            .profile_repo
            .find_by_id(user_id)
            .await
            .or_not_found("ユーザー")?;
        if profile.tenant_id() != tenant_id {
            return Err(CoreError::Forbidden(
                "この組織のユーザーではありません".to_string(),
            ));
        }
        Ok(profile)
    }

    /// 通知先を決めるための部署の取得
    ///
    /// 取得に失敗した場合は通知しないだけで、エラーにはしない。
    async fn find_department(&self, ticket: &Ticket) -> Option<Department> {
        match self
            .deps
            .department_repo
            .find_by_name(ticket.tenant_id(), ticket.department())
            .await
        {
            Ok(department) => department,
            Err(e) => {
                tracing::error!(
                    error.category = log_error::category::INFRASTRUCTURE,
                    error.kind = log_error::kind::RECIPIENT_LOOKUP,
                    error = %e,
                    department = ticket.department(),
                    "通知先の部署の取得に失敗"
                );
                None
            }
        }
    }
}
