use crate::department::Department;

/// Fixed per-department quick-action set, shown when the last bot reply
/// carries no model-suggested actions.
pub fn default_actions(department: Department) -> Vec<String> {
    let labels: [&str; 4] = match department {
        Department::Academic => [
            "Calendário de Provas",
            "Recuperação",
            "Média Escolar",
            "Falar com Atendente",
        ],
        Department::Financial => [
            "Chave PIX",
            "Segunda via de boleto",
            "Consultar Mensalidade",
            "Falar com Atendente",
        ],
        Department::Support => [
            "Google Classroom",
            "Redefinir Senha",
            "E-mail Institucional",
            "Falar com Atendente",
        ],
        Department::Admissions => [
            "Agendar Visita",
            "Valores 2024",
            "Documentos Matrícula",
            "Falar com Atendente",
        ],
        Department::General => [
            "Horários",
            "Uniforme",
            "Cardápio Cantina",
            "Falar com Atendente",
        ],
    };
    labels.into_iter().map(str::to_owned).collect()
}
